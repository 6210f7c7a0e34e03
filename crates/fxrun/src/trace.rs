//! # Stack traces
//!
//! Failures raised inside a function carry a wasm backtrace. Before it is reported the
//! trace is rebased: the outermost run of frames that belong to componentizing glue
//! (`wit-component:*` modules) is dropped, so the trace ends at the user's own code.

use wasmtime::FrameInfo;
use wasmtime::Trap;
use wasmtime::WasmBacktrace;

/// Module name prefix of glue generated by the component toolchain.
const GLUE_MODULE_PREFIX: &str = "wit-component:";

/// One frame of a wasm backtrace, innermost first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub module: String,
    pub offset: Option<usize>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>, module: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            function: function.into(),
            module: module.into(),
            offset,
        }
    }

    pub fn is_glue(&self) -> bool {
        self.module.starts_with(GLUE_MODULE_PREFIX)
    }
}

impl From<&FrameInfo> for StackFrame {
    fn from(frame: &FrameInfo) -> Self {
        let function = match frame.func_name() {
            Some(name) => name.to_string(),
            None => format!("wasm-function[{}]", frame.func_index()),
        };
        let module = frame.module().name().unwrap_or("<module>").to_string();
        Self::new(function, module, frame.module_offset())
    }
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} ({}+{:#x})", self.function, self.module, offset),
            None => write!(f, "{} ({})", self.function, self.module),
        }
    }
}

/// The frames attached to an error, if it came out of wasm.
pub fn capture(error: &wasmtime::Error) -> Vec<StackFrame> {
    error
        .downcast_ref::<WasmBacktrace>()
        .map(|backtrace| backtrace.frames().iter().map(StackFrame::from).collect())
        .unwrap_or_default()
}

/// Drops the outermost run of glue frames.
///
/// Frames are innermost first, so the outermost run is the tail. A trace made only of
/// glue is returned unchanged.
pub fn rebase(mut frames: Vec<StackFrame>) -> Vec<StackFrame> {
    let keep = frames.iter().rposition(|f| !f.is_glue()).map_or(0, |i| i + 1);
    if keep > 0 {
        frames.truncate(keep);
    }
    frames
}

/// Renders frames the way failure payloads carry them.
pub fn render(frames: &[StackFrame]) -> Vec<String> {
    frames.iter().map(StackFrame::to_string).collect()
}

/// The headline of an error raised during a call: the trap, or the innermost cause.
pub fn message(error: &wasmtime::Error) -> String {
    match error.downcast_ref::<Trap>() {
        Some(trap) => trap.to_string(),
        None => error.root_cause().to_string(),
    }
}

/// The rest of the error chain, outermost first, without the backtrace or the headline.
pub fn causes(error: &wasmtime::Error) -> Vec<String> {
    let headline = message(error);
    let backtrace = error.downcast_ref::<WasmBacktrace>().map(WasmBacktrace::to_string);
    error
        .chain()
        .map(|cause| cause.to_string())
        .filter(|cause| *cause != headline && Some(cause) != backtrace.as_ref())
        .collect()
}

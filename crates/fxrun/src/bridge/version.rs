//! SDK contract versions and the capabilities each one offers.

use std::collections::BTreeSet;

/// A released version of the SDK contract. Ordered oldest first.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum SdkVersion {
    V1_0_0,
    V1_1_0,
    V1_1_1,
}

impl SdkVersion {
    pub const ALL: [SdkVersion; 3] = [SdkVersion::V1_0_0, SdkVersion::V1_1_0, SdkVersion::V1_1_1];

    pub fn as_str(self) -> &'static str {
        match self {
            SdkVersion::V1_0_0 => "1.0.0",
            SdkVersion::V1_1_0 => "1.1.0",
            SdkVersion::V1_1_1 => "1.1.1",
        }
    }

    /// Every capability available at this version.
    pub fn capabilities(self) -> BTreeSet<Capability> {
        Capability::ALL.into_iter().filter(|c| c.since() <= self).collect()
    }

    /// The contract functions whose presence identifies this version.
    pub fn markers(self) -> BTreeSet<&'static str> {
        self.capabilities().into_iter().map(Capability::wit_name).collect()
    }

    /// The highest version whose markers are all declared.
    pub fn select(declared: &BTreeSet<String>) -> Option<SdkVersion> {
        Self::ALL
            .into_iter()
            .rev()
            .find(|version| version.markers().iter().all(|m| declared.contains(*m)))
    }
}

impl std::fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One function of the `sf:functions/context` contract.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    OrgId,
    UserId,
    Username,
    ApiVersion,
    OrgDomainUrl,
    CreateRecord,
    QueryRecords,
    UpdateRecord,
    QueryMore,
    EventId,
    EventType,
    RecordField,
}

impl Capability {
    pub const ALL: [Capability; 12] = [
        Capability::OrgId,
        Capability::UserId,
        Capability::Username,
        Capability::ApiVersion,
        Capability::OrgDomainUrl,
        Capability::CreateRecord,
        Capability::QueryRecords,
        Capability::UpdateRecord,
        Capability::QueryMore,
        Capability::EventId,
        Capability::EventType,
        Capability::RecordField,
    ];

    /// Name of the function in the contract interface.
    pub fn wit_name(self) -> &'static str {
        match self {
            Capability::OrgId => "org-id",
            Capability::UserId => "user-id",
            Capability::Username => "username",
            Capability::ApiVersion => "api-version",
            Capability::OrgDomainUrl => "org-domain-url",
            Capability::CreateRecord => "create-record",
            Capability::QueryRecords => "query-records",
            Capability::UpdateRecord => "update-record",
            Capability::QueryMore => "query-more",
            Capability::EventId => "event-id",
            Capability::EventType => "event-type",
            Capability::RecordField => "record-field",
        }
    }

    /// The version that introduced the capability.
    pub fn since(self) -> SdkVersion {
        match self {
            Capability::OrgId
            | Capability::UserId
            | Capability::Username
            | Capability::ApiVersion
            | Capability::OrgDomainUrl
            | Capability::CreateRecord
            | Capability::QueryRecords => SdkVersion::V1_0_0,
            Capability::UpdateRecord
            | Capability::QueryMore
            | Capability::EventId
            | Capability::EventType => SdkVersion::V1_1_0,
            Capability::RecordField => SdkVersion::V1_1_1,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wit_name())
    }
}

//! Built-in OCI realm presets.
//!
//! Every OCI region lives in a realm, and the realm decides the second-level
//! domain that service endpoints hang off. Users normally name only a region;
//! the realm (default `oc1`) fills in the domain used to build
//! `generativeai.<region>.<domain>`.

/// Realm name used when the config does not say otherwise.
pub const DEFAULT_REALM: &str = "oc1";

#[derive(Debug, Clone)]
pub struct RealmPreset {
    pub name: &'static str,
    pub domain: &'static str,
    pub description: &'static str,
}

const PRESETS: &[RealmPreset] = &[
    RealmPreset {
        name: "oc1",
        domain: "oci.oraclecloud.com",
        description: "commercial",
    },
    RealmPreset {
        name: "oc2",
        domain: "oci.oraclegovcloud.com",
        description: "US government",
    },
    RealmPreset {
        name: "oc3",
        domain: "oci.oraclegovcloud.com",
        description: "US federal",
    },
    RealmPreset {
        name: "oc4",
        domain: "oci.oraclegovcloud.uk",
        description: "UK government",
    },
    RealmPreset {
        name: "oc8",
        domain: "oci.oraclecloud8.com",
        description: "Japan dedicated",
    },
];

impl RealmPreset {
    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static RealmPreset> {
        PRESETS.iter().find(|p| p.name == name.to_lowercase())
    }

    #[must_use]
    pub fn all() -> &'static [RealmPreset] {
        PRESETS
    }
}

/// Hostname of the Generative AI inference endpoint for a region.
#[must_use]
pub fn genai_host(region: &str, domain: &str) -> String {
    format!("generativeai.{region}.{domain}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_realms() {
        assert!(RealmPreset::from_name("oc1").is_some());
        assert!(RealmPreset::from_name("OC4").is_some()); // case-insensitive
        assert!(RealmPreset::from_name("oc99").is_none());
    }

    #[test]
    fn test_commercial_host() {
        let realm = RealmPreset::from_name(DEFAULT_REALM).unwrap();
        assert_eq!(
            genai_host("us-ashburn-1", realm.domain),
            "generativeai.us-ashburn-1.oci.oraclecloud.com"
        );
    }

    #[test]
    fn test_all_domains_are_oci_subdomains() {
        for preset in RealmPreset::all() {
            assert!(
                preset.domain.starts_with("oci."),
                "Realm {} should resolve to an oci.* domain",
                preset.name
            );
        }
    }
}

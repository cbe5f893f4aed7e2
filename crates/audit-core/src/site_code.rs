//! Site-code derivation shared by BDR servers and storage buckets.
//!
//! Both naming conventions go through [`extract_site_code`] so that a site's
//! servers and buckets join on the same key.

use std::sync::OnceLock;

use regex::Regex;

/// Site code used when a name is blank.
pub const UNKNOWN_SITE: &str = "UNKNOWN";

/// Naming rules tried in order; the first capture group is the site code.
fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^([A-Z]{2,4})-",
            r"^([A-Z]{2,4})CORP",
            r"^([A-Z]{2,4})LAB",
            r"^([A-Z]{3})[A-Z]{3,4}(?:PS|SLC)",
            r"^([A-Z]{2,4})[A-Z]{1,4}PS",
            r"^([A-Z0-9]+)-",
            r"^([A-Z]{2,}?)(?:BDR|VEEAM|PS|SLC)",
            r"^([A-Z]+)[0-9]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("regex is valid"))
        .collect()
    })
}

/// Derive the short site code from a BDR server or bucket name.
///
/// Deterministic and total: names that match no rule fall back to their
/// first three characters, blank names to [`UNKNOWN_SITE`].
///
/// ```
/// use audit_core::site_code::extract_site_code;
///
/// assert_eq!(extract_site_code("AJC-BDR3"), "AJC");
/// assert_eq!(extract_site_code("HBCCORPPS1BDR1"), "HBC");
/// assert_eq!(extract_site_code("ajc-veeam-backups"), "AJC");
/// ```
pub fn extract_site_code(name: &str) -> String {
    let normalised = name.trim().to_uppercase();
    if normalised.is_empty() {
        return UNKNOWN_SITE.to_string();
    }

    for re in patterns() {
        if let Some(code) = re.captures(&normalised).and_then(|c| c.get(1)) {
            return code.as_str().to_string();
        }
    }

    normalised.chars().take(3).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_suffix() {
        assert_eq!(extract_site_code("AJC-BDR3"), "AJC");
        assert_eq!(extract_site_code("MK-BDR1"), "MK");
    }

    #[test]
    fn test_corp_suffix() {
        assert_eq!(extract_site_code("HBCCORPPS1BDR1"), "HBC");
    }

    #[test]
    fn test_lab_suffix() {
        assert_eq!(extract_site_code("TSTLAB01"), "TST");
    }

    #[test]
    fn test_ps_and_slc_suffixes() {
        assert_eq!(extract_site_code("ABCMAINPS1"), "ABC");
        assert_eq!(extract_site_code("XYZHQSSLC2"), "XYZ");
        assert_eq!(extract_site_code("DENXPS1"), "DEN");
    }

    #[test]
    fn test_bucket_names_share_the_rule() {
        assert_eq!(extract_site_code("ajc-veeam-backups"), "AJC");
        assert_eq!(extract_site_code("hbc-veeam"), "HBC");
        assert_eq!(extract_site_code("longsite-veeam"), "LONGSITE");
    }

    #[test]
    fn test_digit_prefix_rule() {
        assert_eq!(extract_site_code("DEN1BDR"), "DEN");
    }

    #[test]
    fn test_prefix_stops_at_suffix_token() {
        assert_eq!(extract_site_code("AJCBDR1"), "AJC");
        assert_eq!(extract_site_code("ajcbdr"), "AJC");
        assert_eq!(extract_site_code("AJCVEEAM2"), "AJC");
        assert_eq!(extract_site_code("MKSLC3"), "MK");
    }

    #[test]
    fn test_server_and_bucket_join_on_site() {
        assert_eq!(extract_site_code("AJCBDR1"), extract_site_code("ajc-veeam"));
    }

    #[test]
    fn test_fallback_first_three_chars() {
        assert_eq!(extract_site_code("standalone"), "STA");
        assert_eq!(extract_site_code("ab"), "AB");
    }

    #[test]
    fn test_blank_name_maps_to_unknown() {
        assert_eq!(extract_site_code(""), UNKNOWN_SITE);
        assert_eq!(extract_site_code("   "), UNKNOWN_SITE);
    }

    #[test]
    fn test_is_deterministic() {
        for name in ["AJC-BDR3", "HBCCORPPS1BDR1", "ajc-veeam", "zzz"] {
            assert_eq!(extract_site_code(name), extract_site_code(name));
        }
    }
}

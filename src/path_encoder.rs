//! Deterministic path computation for stored documents (spec §3, §4.A).
//!
//! `<enc(type)>/<c1>/<c2>/<c3>/<c4>/<enc(type)>[-<unique-index-name>]-<enc(sig)>.json`

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Mirrors Python's `urllib.parse.quote` default safe set (`/` is left
/// unescaped by `quote`, but type tags and signatures are single path
/// segments here, so we escape `/` too — it would otherwise split the
/// segment in two).
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'^')
    .add(b'|')
    .add(b'[')
    .add(b']');

pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// Compute the relative (repo-root-relative) path for a document.
///
/// `unique_index_name` is the name of the unique index whose projection
/// produced `signature`, if any (spec §3: the file name is
/// `<type>[-<uidx>]-<sig>.json`).
pub fn document_path(type_tag: &str, signature: &str, unique_index_name: Option<&str>) -> String {
    let enc_type = encode_segment(type_tag);
    let enc_sig = encode_segment(signature);
    let fan_out: Vec<char> = enc_sig.chars().take(4).collect();

    let mut segments: Vec<String> = Vec::with_capacity(2 + fan_out.len());
    segments.push(enc_type.clone());
    segments.extend(fan_out.iter().map(|c| c.to_string()));

    let file_name = match unique_index_name {
        Some(name) => format!("{enc_type}-{name}-{enc_sig}.json"),
        None => format!("{enc_type}-{enc_sig}.json"),
    };
    segments.push(file_name);

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_path_matches_spec_scenario_1() {
        // §8 scenario 1: type "obj", unique index "by_id", signature "y".
        assert_eq!(
            document_path("obj", "y", Some("by_id")),
            "obj/y/obj-by_id-y.json"
        );
    }

    #[test]
    fn untyped_short_signature_has_short_fanout() {
        // test_items in original_source: {'id':'y'} with no unique index -> "obj/y/obj-y.json"
        assert_eq!(document_path("obj", "y", None), "obj/y/obj-y.json");
    }

    #[test]
    fn fanout_uses_first_four_signature_chars() {
        assert_eq!(
            document_path("obj", "alice", None),
            "obj/a/l/i/c/obj-alice.json"
        );
    }

    #[test]
    fn determinism_same_inputs_same_path() {
        let a = document_path("User", "1", None);
        let b = document_path("User", "1", None);
        assert_eq!(a, b);
        assert_eq!(a, "User/1/User-1.json");
    }

    #[test]
    fn percent_encodes_unsafe_characters() {
        let path = document_path("ty pe", "si/g", None);
        assert!(path.starts_with("ty%20pe/"));
        assert!(path.contains("si%2Fg"));
    }
}

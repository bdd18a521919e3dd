//! Seed peer list built from registry entries.

use tinyseed_registry::RawPeer;
use tracing::debug;

/// Turns registry peers into `id@host:port` strings.
///
/// A composed entry is kept only if it holds exactly one `@` and the part
/// after it contains a `:`. Anything else is dropped; order is preserved and
/// an empty list is a valid result.
pub fn validate_and_format(raw_peers: &[RawPeer]) -> Vec<String> {
    raw_peers
        .iter()
        .filter_map(|peer| {
            let candidate = format!("{}@{}", peer.id, peer.address);
            if is_valid_descriptor(&candidate) {
                Some(candidate)
            } else {
                debug!(peer = %candidate, "dropping malformed peer");
                None
            }
        })
        .collect()
}

fn is_valid_descriptor(candidate: &str) -> bool {
    match candidate.split_once('@') {
        Some((_, rest)) => !rest.contains('@') && rest.contains(':'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_well_formed_peer_is_kept() {
        let peers = validate_and_format(&[RawPeer::new("abc", "1.2.3.4:26656")]);
        assert_eq!(peers, vec!["abc@1.2.3.4:26656"]);
    }

    #[test]
    fn test_missing_port_is_dropped() {
        assert!(validate_and_format(&[RawPeer::new("abc", "1.2.3.4")]).is_empty());
    }

    #[test]
    fn test_extra_at_sign_is_dropped() {
        assert!(validate_and_format(&[RawPeer::new("a@b", "1.2.3.4:26656")]).is_empty());
    }

    #[test]
    fn test_colon_only_in_id_is_dropped() {
        assert!(validate_and_format(&[RawPeer::new("a:b", "host")]).is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        let peers = validate_and_format(&[
            RawPeer::new("b", "2.2.2.2:1"),
            RawPeer::new("bad", "nope"),
            RawPeer::new("a", "1.1.1.1:2"),
        ]);
        assert_eq!(peers, vec!["b@2.2.2.2:1", "a@1.1.1.1:2"]);
    }

    proptest! {
        #[test]
        fn prop_kept_iff_one_at_and_colon_after(id in "[a-f0-9@:]{0,8}", address in "[a-z0-9.@:]{0,12}") {
            let composed = format!("{}@{}", id, address);
            let expected = composed.matches('@').count() == 1
                && composed.split_once('@').map_or(false, |(_, rest)| rest.contains(':'));

            let kept = validate_and_format(&[RawPeer::new(id.clone(), address.clone())]);
            prop_assert_eq!(kept.len() == 1, expected);
            if expected {
                prop_assert_eq!(&kept[0], &composed);
            }
        }
    }
}

//! Secret scoping.
//!
//! Over-sharing a secret across process boundaries is a security defect,
//! so each process gets exactly the secrets its hosted services can reach:
//! a package's secrets are visible if the package is service-agnostic
//! (shared/global code) or its owning service is in the requested set.

use std::collections::{BTreeMap, BTreeSet};

use gantry_core::AppMeta;

/// The set of secret names accessible to the given services.
pub fn secrets_used_by_services(meta: &AppMeta, svc_names: &[&str]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for pkg in &meta.pkgs {
        if pkg.secrets.is_empty() {
            continue;
        }
        let visible = match &pkg.service_name {
            None => true,
            Some(owner) => svc_names.contains(&owner.as_str()),
        };
        if visible {
            names.extend(pkg.secrets.iter().cloned());
        }
    }
    names
}

/// Every secret name declared anywhere in the metadata that has no defined
/// value. Sorted and deduplicated so callers can report all gaps at once.
pub fn missing_secrets(meta: &AppMeta, defined: &BTreeMap<String, String>) -> Vec<String> {
    let mut missing = BTreeSet::new();
    for pkg in &meta.pkgs {
        for name in &pkg.secrets {
            if !defined.contains_key(name) {
                missing.insert(name.clone());
            }
        }
    }
    missing.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{PackageMeta, Service};

    fn scoping_meta() -> AppMeta {
        AppMeta {
            svcs: vec![
                Service { name: "a".into(), ..Default::default() },
                Service { name: "b".into(), ..Default::default() },
            ],
            pkgs: vec![
                PackageMeta {
                    rel_path: "a".into(),
                    service_name: Some("a".into()),
                    secrets: vec!["S1".into()],
                },
                PackageMeta {
                    rel_path: "b".into(),
                    service_name: Some("b".into()),
                    secrets: vec![],
                },
                PackageMeta {
                    rel_path: "shared".into(),
                    service_name: None,
                    secrets: vec!["S2".into()],
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn service_agnostic_secrets_reach_everyone() {
        let meta = scoping_meta();
        let a: Vec<_> = secrets_used_by_services(&meta, &["a"]).into_iter().collect();
        assert_eq!(a, vec!["S1", "S2"]);
        let b: Vec<_> = secrets_used_by_services(&meta, &["b"]).into_iter().collect();
        assert_eq!(b, vec!["S2"]);
    }

    #[test]
    fn scoping_is_monotonic() {
        let meta = scoping_meta();
        let sub = secrets_used_by_services(&meta, &["b"]);
        let all = secrets_used_by_services(&meta, &["a", "b"]);
        assert!(sub.is_subset(&all));
    }

    #[test]
    fn missing_secrets_sorted_deduplicated() {
        let mut meta = scoping_meta();
        // Declare S1 twice across packages; it must only be reported once.
        meta.pkgs.push(PackageMeta {
            rel_path: "a/inner".into(),
            service_name: Some("a".into()),
            secrets: vec!["S1".into()],
        });

        let mut defined = BTreeMap::new();
        assert_eq!(missing_secrets(&meta, &defined), vec!["S1", "S2"]);

        defined.insert("S1".to_string(), "v1".to_string());
        defined.insert("S2".to_string(), "v2".to_string());
        assert!(missing_secrets(&meta, &defined).is_empty());
    }
}

//! Property-based tests for template merging.
//!
//! These tests use proptest to generate random user and default templates
//! and verify that the merge invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::template::merge::merge_package_lists;
    use crate::template::{merge_templates, AdditionalFile, ImageTemplate, UserConfig};
    use proptest::collection::vec;
    use proptest::prelude::*;

    fn maybe_empty(pattern: &'static str) -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), pattern]
    }

    fn password() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-z]{4,8}",
            "\\$6\\$[a-z]{4,8}\\$[a-z]{8}",
        ]
    }

    /// Users drawn from a small name pool so repeated names are common.
    fn users() -> impl Strategy<Value = Vec<UserConfig>> {
        vec(
            (
                "[a-c]",
                password(),
                maybe_empty("sha(256|512)"),
                proptest::option::of(any::<bool>()),
                vec("[a-d]", 0..4),
                maybe_empty("/bin/(ba|z)?sh"),
            ),
            0..4,
        )
        .prop_map(|users| {
            users
                .into_iter()
                .map(|(name, password, hash_algo, sudo, groups, shell)| UserConfig {
                    name,
                    password,
                    hash_algo,
                    sudo,
                    groups,
                    shell,
                    ..Default::default()
                })
                .collect()
        })
    }

    /// Additional files whose `final` paths may repeat.
    fn files() -> impl Strategy<Value = Vec<AdditionalFile>> {
        vec(("/etc/[a-c]", "files/[a-z]{1,4}"), 0..4).prop_map(|files| {
            files
                .into_iter()
                .map(|(final_path, local)| AdditionalFile { local, final_path })
                .collect()
        })
    }

    fn template() -> impl Strategy<Value = ImageTemplate> {
        (
            maybe_empty("[a-z]{1,10}"),
            maybe_empty("[0-9]\\.[0-9]"),
            maybe_empty("[a-z]{1,10}"),
            maybe_empty("[a-z]{1,10}"),
            vec("[a-z]{1,6}", 0..6),
            users(),
            files(),
            proptest::option::of(any::<bool>()),
            maybe_empty("(efi|legacy)"),
        )
            .prop_map(
                |(name, version, system, hostname, packages, users, files, immutable, boot)| {
                    let mut t = ImageTemplate::default();
                    t.image.name = name;
                    t.image.version = version;
                    t.system_config.name = system;
                    t.system_config.hostname = hostname;
                    t.system_config.packages = packages;
                    t.system_config.users = users;
                    t.system_config.additional_files = files;
                    t.system_config.immutability.enabled = immutable;
                    t.system_config.bootloader.boot_type = boot;
                    t
                },
            )
    }

    proptest! {
        /// Property: merging a merged template with itself changes nothing
        #[test]
        fn merge_is_idempotent(user in template(), default in template()) {
            let once = merge_templates(&user, &default);
            let twice = merge_templates(&once, &once);
            prop_assert_eq!(once, twice);
        }

        /// Property: non-empty user scalars win, empty ones fall back to the default
        #[test]
        fn user_scalars_take_precedence(user in template(), default in template()) {
            let merged = merge_templates(&user, &default);
            let expect = |u: &str, d: &str| if u.is_empty() { d.to_string() } else { u.to_string() };

            prop_assert_eq!(&merged.image.name, &expect(&user.image.name, &default.image.name));
            prop_assert_eq!(&merged.image.version, &expect(&user.image.version, &default.image.version));
            prop_assert_eq!(
                &merged.system_config.hostname,
                &expect(&user.system_config.hostname, &default.system_config.hostname)
            );
            prop_assert_eq!(
                merged.system_config.immutability.enabled,
                user.system_config.immutability.enabled.or(default.system_config.immutability.enabled)
            );
        }

        /// Property: the package list is the de-duplicated union, default first
        #[test]
        fn packages_are_ordered_union(user in template(), default in template()) {
            let merged = merge_templates(&user, &default).system_config.packages;

            for p in user.system_config.packages.iter().chain(&default.system_config.packages) {
                prop_assert!(merged.contains(p), "{} missing from {:?}", p, merged);
            }
            for (i, p) in merged.iter().enumerate() {
                prop_assert!(!merged[i + 1..].contains(p), "{} duplicated in {:?}", p, merged);
            }

            let default_only = merge_package_lists(&default.system_config.packages, &[]);
            prop_assert_eq!(&merged[..default_only.len()], &default_only[..]);
        }

        /// Property: every user of either template appears exactly once
        #[test]
        fn users_are_keyed_by_name(user in template(), default in template()) {
            let merged = merge_templates(&user, &default).system_config.users;
            for u in user.system_config.users.iter().chain(&default.system_config.users) {
                let count = merged.iter().filter(|m| m.name == u.name).count();
                prop_assert_eq!(count, 1, "user {} appears {} times", u.name, count);
            }
        }

        /// Property: every file destination of either template appears exactly once
        #[test]
        fn files_are_keyed_by_final(user in template(), default in template()) {
            let merged = merge_templates(&user, &default).system_config.additional_files;
            let all = user.system_config.additional_files.iter()
                .chain(&default.system_config.additional_files);
            for f in all {
                let count = merged.iter().filter(|m| m.final_path == f.final_path).count();
                prop_assert_eq!(count, 1, "{} appears {} times", f.final_path, count);
            }
        }
    }
}

//! # Template Merging
//!
//! Merges a user template over a vendor default, producing the template a
//! provider builds from.
//!
//! ## Merge rules
//!
//! - **image**: each field takes the user value when non-empty.
//! - **target**: the user's target when any field is set.
//! - **disk**: a user disk with a name, size, or partitions replaces the
//!   default disk wholesale.
//! - **systemConfig**: merged field by field when the user block sets
//!   anything, otherwise the default is kept:
//!   - scalars take the user value when non-empty;
//!   - `packages` is a union, default entries first;
//!   - `users` merge by `name`, `additionalFiles` by `final`;
//!   - `kernel.name` and `kernel.uki` always come from the default.
//! - **packageRepositories**: a non-empty user list replaces the default.
//!
//! Merging is deterministic and idempotent: merging a result with itself
//! returns the same result.

use log::debug;

use super::{
    AdditionalFile, Bootloader, DiskConfig, ImageInfo, ImageTemplate, ImmutabilityConfig,
    KernelConfig, SystemConfig, TargetInfo, UserConfig,
};

/// Merge `user` over `default`.
pub fn merge_templates(user: &ImageTemplate, default: &ImageTemplate) -> ImageTemplate {
    let mut path_list = user.path_list.clone();
    for dir in &default.path_list {
        if !path_list.contains(dir) {
            path_list.push(dir.clone());
        }
    }

    let package_repositories = if user.package_repositories.is_empty() {
        default.package_repositories.clone()
    } else {
        user.package_repositories.clone()
    };

    ImageTemplate {
        image: merge_image(&user.image, &default.image),
        target: merge_target(&user.target, &default.target),
        disk: merge_disk(&user.disk, &default.disk),
        system_config: merge_system_config(&user.system_config, &default.system_config),
        package_repositories,
        path_list,
        ..Default::default()
    }
}

fn pick(user: &str, default: &str) -> String {
    if user.is_empty() {
        default.to_string()
    } else {
        user.to_string()
    }
}

fn merge_image(user: &ImageInfo, default: &ImageInfo) -> ImageInfo {
    ImageInfo {
        name: pick(&user.name, &default.name),
        version: pick(&user.version, &default.version),
    }
}

fn merge_target(user: &TargetInfo, default: &TargetInfo) -> TargetInfo {
    if user.is_empty() {
        default.clone()
    } else {
        user.clone()
    }
}

fn merge_disk(user: &DiskConfig, default: &DiskConfig) -> DiskConfig {
    if user.is_empty() {
        default.clone()
    } else {
        user.clone()
    }
}

fn merge_system_config(user: &SystemConfig, default: &SystemConfig) -> SystemConfig {
    if user.is_empty() {
        debug!("User template has no systemConfig, keeping default");
        let mut kept = default.clone();
        kept.packages = merge_package_lists(&default.packages, &[]);
        kept.users = merge_users(&[], &default.users);
        kept.additional_files = merge_additional_files(&[], &default.additional_files);
        return kept;
    }

    SystemConfig {
        name: pick(&user.name, &default.name),
        description: pick(&user.description, &default.description),
        hostname: pick(&user.hostname, &default.hostname),
        initramfs: super::InitramfsConfig {
            template: pick(&user.initramfs.template, &default.initramfs.template),
        },
        immutability: merge_immutability(&user.immutability, &default.immutability),
        bootloader: merge_bootloader(&user.bootloader, &default.bootloader),
        packages: merge_package_lists(&default.packages, &user.packages),
        kernel: merge_kernel(&user.kernel, &default.kernel),
        users: merge_users(&user.users, &default.users),
        additional_files: merge_additional_files(&user.additional_files, &default.additional_files),
    }
}

fn merge_immutability(user: &ImmutabilityConfig, default: &ImmutabilityConfig) -> ImmutabilityConfig {
    ImmutabilityConfig {
        enabled: user.enabled.or(default.enabled),
        secure_boot_db_key: pick(&user.secure_boot_db_key, &default.secure_boot_db_key),
        secure_boot_db_crt: pick(&user.secure_boot_db_crt, &default.secure_boot_db_crt),
        secure_boot_db_cer: pick(&user.secure_boot_db_cer, &default.secure_boot_db_cer),
    }
}

fn merge_bootloader(user: &Bootloader, default: &Bootloader) -> Bootloader {
    Bootloader {
        boot_type: pick(&user.boot_type, &default.boot_type),
        provider: pick(&user.provider, &default.provider),
    }
}

fn merge_kernel(user: &KernelConfig, default: &KernelConfig) -> KernelConfig {
    KernelConfig {
        name: default.name.clone(),
        version: pick(&user.version, &default.version),
        cmdline: pick(&user.cmdline, &default.cmdline),
        packages: if user.packages.is_empty() {
            default.packages.clone()
        } else {
            user.packages.clone()
        },
        enable_extra_modules: pick(&user.enable_extra_modules, &default.enable_extra_modules),
        uki: default.uki,
    }
}

/// Union of two string lists: `first` in order, then new entries of `second`.
pub fn merge_package_lists(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for item in first.iter().chain(second) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

/// Merge user lists keyed by `name`: default order first, then user-only
/// entries. The first entry of a repeated name wins.
fn merge_users(user: &[UserConfig], default: &[UserConfig]) -> Vec<UserConfig> {
    let mut merged: Vec<UserConfig> = Vec::new();
    for d in default {
        if merged.iter().any(|m| m.name == d.name) {
            continue;
        }
        let source = user.iter().find(|u| u.name == d.name).unwrap_or(d);
        merged.push(merge_user(source, d));
    }

    for u in user {
        if !merged.iter().any(|m| m.name == u.name) {
            merged.push(merge_user(u, u));
        }
    }
    merged
}

/// Field-wise merge of one user present in both templates.
fn merge_user(user: &UserConfig, default: &UserConfig) -> UserConfig {
    let mut merged = default.clone();

    if !user.password.is_empty() {
        merged.password = user.password.clone();
        if user.password.starts_with('$') && user.password != default.password {
            // A new pre-hashed password carries its own algorithm.
            merged.hash_algo = String::new();
        } else if !user.hash_algo.is_empty() {
            merged.hash_algo = user.hash_algo.clone();
        }
    } else if !user.hash_algo.is_empty() {
        merged.hash_algo = user.hash_algo.clone();
    }

    if user.password_max_age.is_some() {
        merged.password_max_age = user.password_max_age;
    }
    merged.startup_script = pick(&user.startup_script, &default.startup_script);
    merged.home = pick(&user.home, &default.home);
    merged.shell = pick(&user.shell, &default.shell);
    merged.groups = merge_package_lists(&default.groups, &user.groups);
    merged.sudo = user.sudo.or(default.sudo);

    merged
}

/// Merge additional files keyed by `final`; user entries replace defaults in
/// place. The first entry of a repeated `final` wins.
fn merge_additional_files(user: &[AdditionalFile], default: &[AdditionalFile]) -> Vec<AdditionalFile> {
    let mut merged: Vec<AdditionalFile> = Vec::new();
    for file in default.iter().chain(user) {
        if merged.iter().any(|m| m.final_path == file.final_path) {
            continue;
        }
        let chosen = user
            .iter()
            .find(|u| u.final_path == file.final_path)
            .unwrap_or(file);
        merged.push(chosen.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{PackageRepository, Partition};
    use std::path::PathBuf;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn with_packages(packages: &[&str]) -> ImageTemplate {
        let mut t = ImageTemplate::default();
        t.system_config.packages = strings(packages);
        t
    }

    #[test]
    fn test_package_union_default_first() {
        let user = with_packages(&["a", "b"]);
        let default = with_packages(&["b", "c"]);
        let merged = merge_templates(&user, &default);
        assert_eq!(merged.system_config.packages, strings(&["b", "c", "a"]));
    }

    #[test]
    fn test_end_to_end_package_merge() {
        let user = ImageTemplate::from_yaml_str(
            r#"
target:
  os: azure-linux
  dist: azl3
  arch: x86_64
  imageType: raw
systemConfig:
  packages: [curl]
"#,
        )
        .unwrap();
        let default = ImageTemplate::from_yaml_str(
            r#"
image:
  name: azl3-default
target:
  os: azure-linux
  dist: azl3
  arch: x86_64
  imageType: raw
systemConfig:
  name: default
  packages: [filesystem, kernel]
"#,
        )
        .unwrap();

        let merged = merge_templates(&user, &default);
        assert_eq!(
            merged.system_config.packages,
            strings(&["filesystem", "kernel", "curl"])
        );
        assert_eq!(merged.system_config.name, "default");
        assert_eq!(merged.image.name, "azl3-default");
    }

    #[test]
    fn test_users_merge_by_name() {
        let mut default = ImageTemplate::default();
        default.system_config.users = vec![
            UserConfig {
                name: "alice".into(),
                sudo: Some(false),
                ..Default::default()
            },
            UserConfig {
                name: "bob".into(),
                shell: "/bin/sh".into(),
                ..Default::default()
            },
        ];
        let mut user = ImageTemplate::default();
        user.system_config.users = vec![UserConfig {
            name: "alice".into(),
            sudo: Some(true),
            ..Default::default()
        }];

        let merged = merge_templates(&user, &default);
        let alice = merged.user("alice").unwrap();
        assert_eq!(alice.sudo, Some(true));
        let bob = merged.user("bob").unwrap();
        assert_eq!(bob, &default.system_config.users[1]);
        assert_eq!(merged.system_config.users.len(), 2);
    }

    #[test]
    fn test_user_only_entries_appended() {
        let mut default = ImageTemplate::default();
        default.system_config.users = vec![UserConfig {
            name: "root".into(),
            ..Default::default()
        }];
        let mut user = ImageTemplate::default();
        user.system_config.users = vec![UserConfig {
            name: "carol".into(),
            groups: strings(&["wheel"]),
            ..Default::default()
        }];
        let merged = merge_templates(&user, &default);
        let names: Vec<&str> = merged
            .system_config
            .users
            .iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(names, vec!["root", "carol"]);
    }

    #[test]
    fn test_prehashed_password_clears_hash_algo() {
        let default = UserConfig {
            name: "admin".into(),
            password: "changeme".into(),
            hash_algo: "sha512".into(),
            ..Default::default()
        };
        let user = UserConfig {
            name: "admin".into(),
            password: "$6$rounds=4096$salt$hash".into(),
            hash_algo: String::new(),
            ..Default::default()
        };
        let merged = merge_user(&user, &default);
        assert_eq!(merged.password, "$6$rounds=4096$salt$hash");
        assert_eq!(merged.hash_algo, "");
    }

    #[test]
    fn test_plain_password_keeps_or_takes_hash_algo() {
        let default = UserConfig {
            name: "admin".into(),
            hash_algo: "sha512".into(),
            ..Default::default()
        };
        let user = UserConfig {
            name: "admin".into(),
            password: "secret".into(),
            ..Default::default()
        };
        assert_eq!(merge_user(&user, &default).hash_algo, "sha512");

        let user = UserConfig {
            name: "admin".into(),
            password: "secret".into(),
            hash_algo: "sha256".into(),
            ..Default::default()
        };
        assert_eq!(merge_user(&user, &default).hash_algo, "sha256");

        let user = UserConfig {
            name: "admin".into(),
            hash_algo: "yescrypt".into(),
            ..Default::default()
        };
        let merged = merge_user(&user, &default);
        assert_eq!(merged.hash_algo, "yescrypt");
        assert_eq!(merged.password, "");
    }

    #[test]
    fn test_user_groups_union_and_optional_fields() {
        let default = UserConfig {
            name: "ops".into(),
            groups: strings(&["wheel", "adm"]),
            password_max_age: Some(90),
            shell: "/bin/bash".into(),
            sudo: Some(true),
            ..Default::default()
        };
        let user = UserConfig {
            name: "ops".into(),
            groups: strings(&["adm", "docker"]),
            home: "/srv/ops".into(),
            ..Default::default()
        };
        let merged = merge_user(&user, &default);
        assert_eq!(merged.groups, strings(&["wheel", "adm", "docker"]));
        assert_eq!(merged.password_max_age, Some(90));
        assert_eq!(merged.shell, "/bin/bash");
        assert_eq!(merged.home, "/srv/ops");
        assert_eq!(merged.sudo, Some(true));
    }

    #[test]
    fn test_immutability_tri_state() {
        let mut default = ImageTemplate::default();
        default.system_config.name = "d".into();
        default.system_config.immutability.enabled = Some(true);

        let mut user = ImageTemplate::default();
        user.system_config.name = "u".into();
        let merged = merge_templates(&user, &default);
        assert_eq!(merged.system_config.immutability.enabled, Some(true));

        user.system_config.immutability.enabled = Some(false);
        let merged = merge_templates(&user, &default);
        assert_eq!(merged.system_config.immutability.enabled, Some(false));

        user.system_config.immutability.enabled = Some(true);
        user.system_config.immutability.secure_boot_db_crt = "/k/db.crt".into();
        let merged = merge_templates(&user, &default);
        assert_eq!(merged.system_config.immutability.enabled, Some(true));
        assert_eq!(merged.system_config.immutability.secure_boot_db_crt, "/k/db.crt");
    }

    #[test]
    fn test_kernel_name_and_uki_from_default() {
        let mut default = ImageTemplate::default();
        default.system_config.kernel = KernelConfig {
            name: "linux".into(),
            version: "6.6".into(),
            cmdline: "quiet".into(),
            packages: strings(&["kernel"]),
            enable_extra_modules: String::new(),
            uki: true,
        };
        let mut user = ImageTemplate::default();
        user.system_config.kernel = KernelConfig {
            name: "custom".into(),
            version: "6.12".into(),
            uki: false,
            ..Default::default()
        };
        let merged = merge_templates(&user, &default).system_config.kernel;
        assert_eq!(merged.name, "linux");
        assert!(merged.uki);
        assert_eq!(merged.version, "6.12");
        assert_eq!(merged.cmdline, "quiet");
        assert_eq!(merged.packages, strings(&["kernel"]));
    }

    #[test]
    fn test_bootloader_fields_merge_independently() {
        let mut default = ImageTemplate::default();
        default.system_config.bootloader = Bootloader {
            boot_type: "efi".into(),
            provider: "grub".into(),
        };
        let mut user = ImageTemplate::default();
        user.system_config.bootloader.provider = "systemd-boot".into();
        let merged = merge_templates(&user, &default).system_config.bootloader;
        assert_eq!(merged.boot_type, "efi");
        assert_eq!(merged.provider, "systemd-boot");
    }

    #[test]
    fn test_additional_files_merge_by_final() {
        let mut default = ImageTemplate::default();
        default.system_config.additional_files = vec![
            AdditionalFile {
                local: "default/motd".into(),
                final_path: "/etc/motd".into(),
            },
            AdditionalFile {
                local: "default/issue".into(),
                final_path: "/etc/issue".into(),
            },
        ];
        let mut user = ImageTemplate::default();
        user.system_config.additional_files = vec![
            AdditionalFile {
                local: "mine/extra".into(),
                final_path: "/etc/extra".into(),
            },
            AdditionalFile {
                local: "mine/motd".into(),
                final_path: "/etc/motd".into(),
            },
        ];
        let merged = merge_templates(&user, &default).system_config.additional_files;
        let locals: Vec<&str> = merged.iter().map(|f| f.local.as_str()).collect();
        assert_eq!(locals, vec!["mine/motd", "default/issue", "mine/extra"]);
    }

    #[test]
    fn test_disk_replaced_wholesale() {
        let mut default = ImageTemplate::default();
        default.disk = DiskConfig {
            name: "default".into(),
            size: "8GiB".into(),
            partition_table_type: "gpt".into(),
            partitions: vec![Partition {
                id: "root".into(),
                ..Default::default()
            }],
        };
        let mut user = ImageTemplate::default();
        user.disk.size = "16GiB".into();
        let merged = merge_templates(&user, &default);
        assert_eq!(merged.disk.size, "16GiB");
        assert!(merged.disk.partitions.is_empty());
        assert_eq!(merged.disk.partition_table_type, "");

        let user = ImageTemplate::default();
        assert_eq!(merge_templates(&user, &default).disk, default.disk);
    }

    #[test]
    fn test_package_repositories_replace() {
        let repo = |name: &str| PackageRepository {
            codename: name.into(),
            url: format!("https://{}.example.com", name),
            ..Default::default()
        };
        let mut default = ImageTemplate::default();
        default.package_repositories = vec![repo("base"), repo("extras")];
        let mut user = ImageTemplate::default();

        let merged = merge_templates(&user, &default);
        assert_eq!(merged.package_repositories.len(), 2);

        user.package_repositories = vec![repo("internal")];
        let merged = merge_templates(&user, &default);
        assert_eq!(merged.package_repositories, vec![repo("internal")]);
    }

    #[test]
    fn test_target_and_image_precedence() {
        let mut default = ImageTemplate::default();
        default.image.name = "default".into();
        default.image.version = "1.0".into();
        default.target.os = "ubuntu".into();

        let mut user = ImageTemplate::default();
        user.image.version = "2.0".into();
        let merged = merge_templates(&user, &default);
        assert_eq!(merged.image.name, "default");
        assert_eq!(merged.image.version, "2.0");
        assert_eq!(merged.target.os, "ubuntu");

        user.target.os = "wind-river-elxr".into();
        assert_eq!(merge_templates(&user, &default).target.os, "wind-river-elxr");
    }

    #[test]
    fn test_path_lists_are_combined() {
        let mut user = ImageTemplate::default();
        user.path_list = vec![PathBuf::from("/user")];
        let mut default = ImageTemplate::default();
        default.path_list = vec![PathBuf::from("/defaults"), PathBuf::from("/user")];
        let merged = merge_templates(&user, &default);
        assert_eq!(
            merged.path_list,
            vec![PathBuf::from("/user"), PathBuf::from("/defaults")]
        );
    }

    #[test]
    fn test_merge_is_idempotent_on_sample() {
        let mut default = with_packages(&["filesystem", "kernel"]);
        default.system_config.users = vec![UserConfig {
            name: "root".into(),
            hash_algo: "sha512".into(),
            ..Default::default()
        }];
        let mut user = with_packages(&["curl"]);
        user.system_config.users = vec![UserConfig {
            name: "root".into(),
            password: "$6$x".into(),
            ..Default::default()
        }];
        let once = merge_templates(&user, &default);
        let twice = merge_templates(&once, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unchanged_prehashed_password_keeps_hash_algo() {
        let mut default = ImageTemplate::default();
        default.system_config.users = vec![UserConfig {
            name: "admin".into(),
            password: "$6$salt$hash".into(),
            hash_algo: "sha512".into(),
            ..Default::default()
        }];
        let mut user = ImageTemplate::default();
        user.system_config.users = vec![UserConfig {
            name: "admin".into(),
            sudo: Some(true),
            ..Default::default()
        }];

        let once = merge_templates(&user, &default);
        let admin = once.user("admin").unwrap();
        assert_eq!(admin.hash_algo, "sha512");
        assert_eq!(admin.sudo, Some(true));

        let twice = merge_templates(&once, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_repeated_keys_collapse_to_first_entry() {
        let mut default = ImageTemplate::default();
        default.system_config.additional_files = vec![
            AdditionalFile {
                local: "a".into(),
                final_path: "/etc/x".into(),
            },
            AdditionalFile {
                local: "b".into(),
                final_path: "/etc/x".into(),
            },
        ];
        default.system_config.users = vec![
            UserConfig {
                name: "root".into(),
                shell: "/bin/sh".into(),
                groups: strings(&["wheel", "wheel"]),
                ..Default::default()
            },
            UserConfig {
                name: "root".into(),
                shell: "/bin/zsh".into(),
                ..Default::default()
            },
        ];

        let once = merge_templates(&ImageTemplate::default(), &default);
        let files = &once.system_config.additional_files;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].local, "a");
        let users = &once.system_config.users;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].shell, "/bin/sh");
        assert_eq!(users[0].groups, strings(&["wheel"]));

        assert_eq!(merge_templates(&once, &once), once);
    }
}

//! Structural validation of templates.
//!
//! User templates are often partial, so they are only required to name a
//! complete target. Merged and default templates must also name the image and
//! system configuration, and their users, files, and partitions must be
//! well-formed.

use std::collections::HashSet;

use super::{ImageTemplate, ImageType};
use crate::error::{Error, Result};

/// How strictly a template is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationScope {
    /// A user-supplied, possibly partial template.
    User,
    /// A merged or vendor default template.
    Full,
}

/// Validate `template`, naming it `label` in error messages.
pub fn validate_template(template: &ImageTemplate, scope: ValidationScope, label: &str) -> Result<()> {
    let fail = |message: String| Error::TemplateValidation {
        template: label.to_string(),
        message,
    };

    let target = &template.target;
    for (field, value) in [
        ("target.os", &target.os),
        ("target.dist", &target.dist),
        ("target.arch", &target.arch),
        ("target.imageType", &target.image_type),
    ] {
        if value.is_empty() {
            return Err(fail(format!("{} is required", field)));
        }
    }
    if ImageType::parse(&target.image_type).is_err() {
        let allowed: Vec<&str> = ImageType::ALL.iter().map(|t| t.as_str()).collect();
        return Err(fail(format!(
            "target.imageType '{}' must be one of {}",
            target.image_type,
            allowed.join(", ")
        )));
    }

    if scope == ValidationScope::User {
        return Ok(());
    }

    if template.image.name.is_empty() {
        return Err(fail("image.name is required".to_string()));
    }
    if template.system_config.name.is_empty() {
        return Err(fail("systemConfig.name is required".to_string()));
    }

    let mut seen = HashSet::new();
    for user in &template.system_config.users {
        if user.name.is_empty() {
            return Err(fail("every user needs a name".to_string()));
        }
        if !seen.insert(user.name.as_str()) {
            return Err(fail(format!("duplicate user '{}'", user.name)));
        }
    }

    for file in &template.system_config.additional_files {
        if file.local.is_empty() || file.final_path.is_empty() {
            return Err(fail(
                "additionalFiles entries need both 'local' and 'final'".to_string(),
            ));
        }
    }

    for (index, partition) in template.disk.partitions.iter().enumerate() {
        if partition.id.is_empty() {
            return Err(fail(format!("disk.partitions[{}] has no id", index)));
        }
    }

    Ok(())
}

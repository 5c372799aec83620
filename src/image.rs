//! Image assembly.
//!
//! Partitioning, filesystem creation, and bootloader installation belong to
//! an external assembler. The [`ImageAssembler`] trait is the contract the
//! providers call; [`ExternalAssembler`] hands the resolved template to an
//! assembler program on `PATH`.

use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use crate::error::{Error, Result};
use crate::template::{ImageTemplate, ImageType};

/// Default assembler program name.
pub const DEFAULT_ASSEMBLER: &str = "os-image-assembler";

/// Trait for image assembly - allows mocking in tests
pub trait ImageAssembler: Send + Sync {
    fn build_raw_image(&self, template: &ImageTemplate) -> Result<()>;
    fn build_iso_image(&self, template: &ImageTemplate) -> Result<()>;
    fn build_initrd_image(&self, template: &ImageTemplate) -> Result<()>;
}

/// Runs `<program> <raw|iso|initrd> <template.yml>` for each image.
pub struct ExternalAssembler {
    program: String,
    work_dir: PathBuf,
}

impl ExternalAssembler {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_program(DEFAULT_ASSEMBLER, work_dir)
    }

    pub fn with_program(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Write the resolved template where the assembler reads it.
    pub fn write_template(&self, template: &ImageTemplate) -> Result<PathBuf> {
        let dir = self
            .work_dir
            .join(template.provider_id())
            .join("imagebuild");
        fs::create_dir_all(&dir)?;

        let name = if template.image.name.is_empty() {
            "image"
        } else {
            template.image.name.as_str()
        };
        let path = dir.join(format!("{}.yml", name));
        fs::write(&path, template.to_yaml()?)?;
        debug!("Wrote assembler input {}", path.display());
        Ok(path)
    }

    fn run(&self, image_type: ImageType, template: &ImageTemplate) -> Result<()> {
        let kind = image_type.config_name();
        let program = which::which(&self.program).map_err(|e| Error::Build {
            image_type: kind.to_string(),
            message: format!("assembler '{}' not found: {}", self.program, e),
        })?;
        let input = self.write_template(template)?;

        info!("Assembling {} image with {}", kind, program.display());
        let output = Command::new(&program)
            .arg(kind)
            .arg(&input)
            .output()
            .map_err(|e| Error::Build {
                image_type: kind.to_string(),
                message: format!("failed to run {}: {}", program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Build {
                image_type: kind.to_string(),
                message: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

impl ImageAssembler for ExternalAssembler {
    fn build_raw_image(&self, template: &ImageTemplate) -> Result<()> {
        self.run(ImageType::Raw, template)
    }

    fn build_iso_image(&self, template: &ImageTemplate) -> Result<()> {
        self.run(ImageType::Iso, template)
    }

    fn build_initrd_image(&self, template: &ImageTemplate) -> Result<()> {
        self.run(ImageType::Img, template)
    }
}

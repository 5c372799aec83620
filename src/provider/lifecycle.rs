//! Stage ordering for a provider build.
//!
//! ```text
//! Registered -> Initialized -> PreProcessed -> Built -> PostProcessed
//! ```
//!
//! [`Lifecycle`] rejects out-of-order calls. [`run_build`] drives all stages
//! and always finishes with `post_process`, passing along the first error.

use log::{error, info};
use std::fmt;

use super::Provider;
use crate::error::{Error, Result};
use crate::template::ImageTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Registered,
    Initialized,
    PreProcessed,
    Built,
    PostProcessed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Registered => "registered",
            LifecycleState::Initialized => "initialized",
            LifecycleState::PreProcessed => "pre-processed",
            LifecycleState::Built => "built",
            LifecycleState::PostProcessed => "post-processed",
        };
        f.write_str(name)
    }
}

/// A provider together with the stage it has reached.
pub struct Lifecycle<'a> {
    provider: &'a mut dyn Provider,
    state: LifecycleState,
}

impl<'a> Lifecycle<'a> {
    pub fn new(provider: &'a mut dyn Provider) -> Self {
        Self {
            provider,
            state: LifecycleState::Registered,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn expect(&self, stage: &str, allowed: &[LifecycleState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                provider: self.provider.name().to_string(),
                stage: stage.to_string(),
                state: self.state.to_string(),
            })
        }
    }

    pub fn init(&mut self) -> Result<()> {
        if self.state == LifecycleState::Initialized {
            return Ok(());
        }
        self.expect("init", &[LifecycleState::Registered])?;
        self.provider.init()?;
        self.state = LifecycleState::Initialized;
        Ok(())
    }

    pub fn pre_process(&mut self, template: &mut ImageTemplate) -> Result<()> {
        self.expect("pre-process", &[LifecycleState::Initialized])?;
        self.provider.pre_process(template)?;
        self.state = LifecycleState::PreProcessed;
        Ok(())
    }

    pub fn build_image(&mut self, template: &ImageTemplate) -> Result<()> {
        self.expect("build", &[LifecycleState::PreProcessed])?;
        self.provider.build_image(template)?;
        self.state = LifecycleState::Built;
        Ok(())
    }

    /// Run teardown. Allowed from every state except `PostProcessed`.
    pub fn post_process(&mut self, template: &ImageTemplate, prior: Option<Error>) -> Result<()> {
        self.expect(
            "post-process",
            &[
                LifecycleState::Registered,
                LifecycleState::Initialized,
                LifecycleState::PreProcessed,
                LifecycleState::Built,
            ],
        )?;
        self.state = LifecycleState::PostProcessed;
        self.provider.post_process(template, prior)
    }
}

/// Run every stage of `provider` against `template`.
///
/// `post_process` runs whether or not an earlier stage failed, and the first
/// failure is what the caller gets back.
pub fn run_build(provider: &mut dyn Provider, template: Option<&mut ImageTemplate>) -> Result<()> {
    let Some(template) = template else {
        return Err(Error::MissingTemplate);
    };

    let mut lifecycle = Lifecycle::new(provider);
    let outcome = run_stages(&mut lifecycle, template);

    let result = lifecycle.post_process(template, outcome.err());
    match &result {
        Ok(()) => info!("Image build completed successfully"),
        Err(e) => error!("Image build failed: {}", e),
    }
    result
}

fn run_stages(lifecycle: &mut Lifecycle<'_>, template: &mut ImageTemplate) -> Result<()> {
    lifecycle.init()?;
    lifecycle.pre_process(template)?;
    lifecycle.build_image(template)
}

//! Book cover studio library
//!
//! Prompt building, image generation, and download for book covers, packaged
//! as a service module.

pub mod modules;
pub mod utils;

pub use modules::covers;

use anyhow::Context;
use bookcover_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Build the registry, run module lifecycle around the HTTP server.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings).context("failed to register modules")?;

    let ctx = InitCtx { settings };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = bookcover_http::start_server(&registry, settings).await;

    registry.stop_modules().await?;
    served
}

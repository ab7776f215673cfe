//! Testing utilities and mock implementations.
//!
//! This module provides a mock renderer backend so the pool, capture
//! engine and orchestrator can be tested without a real headless
//! renderer process.
//!
//! # Example
//!
//! ```rust,ignore
//! use svgmoji_core::testing::{fixtures, MockRenderBackend};
//!
//! let backend = Arc::new(MockRenderBackend::new());
//! backend.set_animations(vec![fixtures::style_animation("spin", 1000.0, None)]);
//!
//! let pool = WorkerPool::new(PoolConfig::default(), backend.clone());
//! // Use in the capture engine or orchestrator...
//! ```

mod mock_renderer;

pub use mock_renderer::{MockRenderBackend, MockRenderWorker};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::renderer::{AnimationInfo, AnimationKind};

    /// A minimal animated SVG document.
    pub fn animated_svg() -> String {
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">"#,
            r#"<circle cx="50" cy="50" r="40" fill="red">"#,
            r#"<animate attributeName="r" from="10" to="40" dur="1s" repeatCount="indefinite"/>"#,
            r#"</circle></svg>"#
        )
        .to_string()
    }

    /// A minimal static SVG document.
    pub fn static_svg() -> String {
        r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><rect width="100" height="100" fill="#00ff00"/></svg>"##
            .to_string()
    }

    /// A declarative (SMIL) animation entry.
    pub fn declarative_animation(id: &str, iteration_ms: f64) -> AnimationInfo {
        AnimationInfo {
            id: id.to_string(),
            kind: AnimationKind::Declarative,
            active_duration_ms: Some(iteration_ms),
            iteration_duration_ms: iteration_ms,
        }
    }

    /// A style-driven animation entry. `active_ms` is `None` for
    /// infinitely repeating animations.
    pub fn style_animation(id: &str, iteration_ms: f64, active_ms: Option<f64>) -> AnimationInfo {
        AnimationInfo {
            id: id.to_string(),
            kind: AnimationKind::StyleDriven,
            active_duration_ms: active_ms,
            iteration_duration_ms: iteration_ms,
        }
    }
}

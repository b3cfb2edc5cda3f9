//! Kernel utilities shared by FileVault hosts.
//! Keep this crate lightweight; it only knows how to load settings and turn them into
//! engine configuration.
//!
//! ## Config loading (non-wasm)
//! ```rust,no_run
//! use fv_kernel::config::load_config;
//! use fv_kernel::settings::AppConfig;
//!
//! let cfg: AppConfig = load_config(Some("filevault.toml")).unwrap();
//! let engine = cfg.vault.engine_config();
//! assert!(engine.validate().is_ok());
//! ```
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
pub mod settings;

pub use fv_vault as vault;

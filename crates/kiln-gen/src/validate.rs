//! Sprite quality validation
//!
//! Scores a generated sprite against game-readiness rules. Each failed
//! check subtracts a fixed penalty from a starting score of 1.0. Only
//! undecodable payloads are errors; everything else is a warning.

use crate::config::ValidationConfig;
use kiln_core::{GeneratedSprite, SpriteFormat};
use serde::{Deserialize, Serialize};

const DIMENSION_PENALTY: f32 = 0.1;
const FORMAT_PENALTY: f32 = 0.1;
const ALPHA_PENALTY: f32 = 0.2;
const PAYLOAD_PENALTY: f32 = 0.1;
const SMALL_AXIS_PENALTY: f32 = 0.1;

/// A single validation check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

/// Status of a validation check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Full validation report for a sprite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub sprite_id: String,
    /// No errors were found
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Quality score in [0, 1]
    pub score: f32,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    /// Count checks by status
    pub fn count_by_status(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// Print a formatted summary
    pub fn print_summary(&self) {
        println!("Validation: {}", self.sprite_id);
        for check in &self.checks {
            let icon = match check.status {
                CheckStatus::Pass => "OK",
                CheckStatus::Warn => "WARN",
                CheckStatus::Fail => "FAIL",
            };
            println!("  {}: {}  {}", check.name, check.detail, icon);
        }
        println!("  Score: {:.2}", self.score);
        if self.valid {
            println!("  Result: VALID");
        } else {
            println!("  Result: INVALID ({} errors)", self.errors.len());
        }
    }
}

/// Accumulates checks and penalties
struct ReportBuilder {
    checks: Vec<ValidationCheck>,
    errors: Vec<String>,
    warnings: Vec<String>,
    penalty: f32,
}

impl ReportBuilder {
    fn new() -> Self {
        Self {
            checks: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            penalty: 0.0,
        }
    }

    fn pass(&mut self, name: &str, detail: String) {
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Pass,
            detail,
        });
    }

    fn warn(&mut self, name: &str, detail: String, penalty: f32) {
        self.warnings.push(format!("{}: {}", name, detail));
        self.penalty += penalty;
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Warn,
            detail,
        });
    }

    fn fail(&mut self, name: &str, detail: String) {
        self.errors.push(format!("{}: {}", name, detail));
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Fail,
            detail,
        });
    }

    fn finish(self, sprite_id: String) -> ValidationReport {
        let valid = self.errors.is_empty();
        let score = if valid {
            (1.0 - self.penalty).clamp(0.0, 1.0)
        } else {
            0.0
        };
        ValidationReport {
            sprite_id,
            valid,
            errors: self.errors,
            warnings: self.warnings,
            score,
            checks: self.checks,
        }
    }
}

/// Scores sprites against the configured thresholds
#[derive(Debug, Clone, Default)]
pub struct QualityValidator {
    config: ValidationConfig,
}

impl QualityValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a sprite. Never fails; problems are reported in the result.
    #[tracing::instrument(skip_all, fields(sprite = %sprite.id))]
    pub fn validate(&self, sprite: &GeneratedSprite) -> ValidationReport {
        let mut report = ReportBuilder::new();

        if sprite.width == 0 || sprite.height == 0 {
            report.fail(
                "Dimensions",
                format!("missing dimensions ({}x{})", sprite.width, sprite.height),
            );
            return report.finish(sprite.id.to_string());
        }

        let decoded = match image::load_from_memory(&sprite.data) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(error = %e, "sprite payload could not be decoded");
                report.fail("Decode", format!("undecodable image: {}", e));
                return report.finish(sprite.id.to_string());
            }
        };
        report.pass("Decode", format!("{} bytes", sprite.data.len()));

        let (w, h) = (decoded.width(), decoded.height());
        if (w, h) == (sprite.width, sprite.height) {
            report.pass("Dimensions", format!("{}x{}", w, h));
        } else {
            report.warn(
                "Dimensions",
                format!(
                    "declared {}x{} but decoded {}x{}",
                    sprite.width, sprite.height, w, h
                ),
                DIMENSION_PENALTY,
            );
        }

        if sprite.format == SpriteFormat::Png {
            report.pass("Format", sprite.format.to_string());
        } else {
            report.warn(
                "Format",
                format!("{} is not the preferred lossless format (png)", sprite.format),
                FORMAT_PENALTY,
            );
        }

        if decoded.color().has_alpha() {
            report.pass("Alpha", "present".to_string());
        } else if self.config.require_alpha {
            report.warn("Alpha", "no alpha channel".to_string(), ALPHA_PENALTY);
        }

        if sprite.data.len() <= self.config.max_payload_bytes {
            report.pass(
                "Payload",
                format!("{} / {} bytes", sprite.data.len(), self.config.max_payload_bytes),
            );
        } else {
            report.warn(
                "Payload",
                format!(
                    "{} bytes exceeds {} byte ceiling",
                    sprite.data.len(),
                    self.config.max_payload_bytes
                ),
                PAYLOAD_PENALTY,
            );
        }

        let min = self.config.min_dimension;
        for (axis, size) in [("Width", w), ("Height", h)] {
            if size < min {
                report.warn(axis, format!("{} px below minimum {}", size, min), SMALL_AXIS_PENALTY);
            } else {
                report.pass(axis, format!("{} px", size));
            }
        }

        let result = report.finish(sprite.id.to_string());
        tracing::debug!(score = result.score, warnings = result.warnings.len(), "validated sprite");
        result
    }
}

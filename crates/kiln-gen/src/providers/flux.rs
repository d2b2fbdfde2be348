//! Flux text-to-image backend, hosted on fal.ai
//!
//! One POST per sprite, then a GET for the rendered image, which is
//! fitted to the requested resolution with nearest-neighbour scaling.
//! Nothing is retried here; failures come back as `KilnError::Generation`.

use crate::config::KilnConfig;
use crate::params::GenerationParams;
use crate::prompt::CompiledPrompt;
use crate::provider::{sprite_metadata, ProviderStatus, SpriteGenerator};
use image::imageops::FilterType;
use kiln_core::{GeneratedSprite, KilnError, Result, SpriteId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://fal.run/fal-ai/flux/dev";
const TIMEOUT: Duration = Duration::from_secs(60);

pub struct FluxProvider {
    key: String,
    endpoint: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    image_size: ImageSize,
    num_images: u32,
    seed: u64,
    enable_safety_checker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_inference_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance_scale: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    loras: Vec<Lora<'a>>,
}

#[derive(Debug, Serialize)]
struct ImageSize {
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct Lora<'a> {
    path: &'a str,
    scale: f32,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    images: Vec<RenderedImage>,
}

#[derive(Debug, Deserialize)]
struct RenderedImage {
    url: String,
}

impl<'a> RenderRequest<'a> {
    fn new(prompt: &'a CompiledPrompt, params: &GenerationParams) -> Self {
        Self {
            prompt: &prompt.positive,
            negative_prompt: &prompt.negative,
            image_size: ImageSize {
                width: params.resolution.width,
                height: params.resolution.height,
            },
            num_images: 1,
            seed: prompt.effective_seed(),
            enable_safety_checker: false,
            num_inference_steps: prompt.steps,
            guidance_scale: prompt.guidance_scale,
            loras: prompt
                .lora
                .as_deref()
                .map(|path| Lora {
                    path,
                    scale: prompt.lora_weight.unwrap_or(1.0),
                })
                .into_iter()
                .collect(),
        }
    }
}

impl RenderResponse {
    fn into_url(self) -> Result<String> {
        self.images
            .into_iter()
            .next()
            .map(|img| img.url)
            .ok_or_else(|| KilnError::Generation("Flux response contained no images".into()))
    }
}

/// Pull the first image URL out of a raw Flux response body
pub fn parse_flux_response(body: &str) -> Result<String> {
    serde_json::from_str::<RenderResponse>(body)
        .map_err(|e| KilnError::Generation(format!("malformed Flux response: {}", e)))?
        .into_url()
}

impl FluxProvider {
    /// Requires `providers.flux.api_key` or `KILN_FLUX_API_KEY`
    pub fn from_config(config: &KilnConfig) -> Result<Self> {
        let key = config.api_key("flux").ok_or_else(|| {
            KilnError::Configuration(
                "no Flux API key; set KILN_FLUX_API_KEY or providers.flux.api_key".into(),
            )
        })?;
        let endpoint = config.api_url("flux").unwrap_or(DEFAULT_ENDPOINT);
        Ok(Self::with_endpoint(key, endpoint))
    }

    fn with_endpoint(key: &str, endpoint: &str) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .into();
        Self {
            key: key.to_string(),
            endpoint: endpoint.to_string(),
            agent,
        }
    }

    fn submit(&self, request: &RenderRequest<'_>) -> Result<String> {
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Key {}", self.key))
            .send_json(request)
            .map_err(|e| KilnError::Generation(format!("Flux request to {} failed: {}", self.endpoint, e)))?;

        response
            .body_mut()
            .read_json::<RenderResponse>()
            .map_err(|e| KilnError::Generation(format!("malformed Flux response: {}", e)))?
            .into_url()
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.agent
            .get(url)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_vec())
            .map_err(|e| KilnError::Generation(format!("could not fetch {}: {}", url, e)))
    }
}

impl SpriteGenerator for FluxProvider {
    fn name(&self) -> &str {
        "flux"
    }

    fn health_check(&self) -> Result<ProviderStatus> {
        Ok(if self.key.trim().is_empty() {
            ProviderStatus::NoApiKey
        } else {
            ProviderStatus::Available
        })
    }

    fn generate(&self, prompt: &CompiledPrompt, params: &GenerationParams) -> Result<GeneratedSprite> {
        params.validate()?;
        let request = RenderRequest::new(prompt, params);
        tracing::debug!(model = %prompt.model, seed = request.seed, "flux render");

        let url = self.submit(&request)?;
        let bytes = self.fetch(&url)?;
        let mut pixels = image::load_from_memory(&bytes)
            .map_err(|e| KilnError::Generation(format!("Flux image could not be decoded: {}", e)))?
            .to_rgba8();

        let target = (params.resolution.width, params.resolution.height);
        if pixels.dimensions() != target {
            tracing::debug!(from = ?pixels.dimensions(), to = %params.resolution, "fitting flux output");
            pixels = image::imageops::resize(&pixels, target.0, target.1, FilterType::Nearest);
        }

        let metadata = sprite_metadata(self.name(), prompt, params);
        GeneratedSprite::from_rgba(SpriteId::new(&params.label()), &pixels, metadata)
    }
}

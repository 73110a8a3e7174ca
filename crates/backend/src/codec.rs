//! Per-family request codecs.
//!
//! A task's raw parameters are turned into the request a backend family
//! expects. [`WireRequest`] is the tagged union over families; each
//! family's request type implements [`FamilyRequest`], which extracts the
//! required fields and fills in family defaults for anything omitted.

use genq_core::registry::RequestFamily;
use genq_core::types::DbId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NEGATIVE_PROMPT: &str = "nsfw,(worst quality:2),(low quality:2)";
pub const DEFAULT_NUM_INFERENCE_STEPS: i32 = 20;
pub const DEFAULT_WIDTH: i32 = 512;
pub const DEFAULT_HEIGHT: i32 = 512;
pub const DEFAULT_GUIDANCE_SCALE: i32 = 7;

/// Seed value asking the backend to pick a random seed.
pub const RANDOM_SEED: i64 = -1;

/// Task-level facts a codec may embed in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    pub task_id: DbId,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Parameters are not JSON, or a field is missing or mistyped.
    #[error("parse task parameter error: {0}")]
    Parse(String),

    #[error("encode request error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Capability every family request type provides.
pub trait FamilyRequest: Serialize + Sized {
    const FAMILY: RequestFamily;

    /// Build the request from raw task parameters.
    fn parse(parameters: &str, ctx: &TaskContext) -> Result<Self, CodecError>;

    /// Serialize to the text frame sent to the backend.
    fn encode(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Encode)
    }
}

/// Deserialize raw parameters into a family's input shape.
fn decode_parameters<T: DeserializeOwned>(parameters: &str) -> Result<T, CodecError> {
    serde_json::from_str(parameters).map_err(|e| CodecError::Parse(e.to_string()))
}

/// Request accepted by Gradio-hosted diffusion backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradioRequest {
    pub task_id: DbId,
    pub prompt: String,
    pub negative_prompt: String,
    pub num_inference_steps: i32,
    pub width: i32,
    pub height: i32,
    pub guidance_scale: i32,
    pub rand_seed: i64,
}

/// Caller-facing Gradio parameters. Only `prompt` is required.
#[derive(Debug, Deserialize)]
struct GradioParameters {
    prompt: String,
    negative_prompt: Option<String>,
    num_inference_steps: Option<i32>,
    width: Option<i32>,
    height: Option<i32>,
    guidance_scale: Option<i32>,
    rand_seed: Option<i64>,
}

impl FamilyRequest for GradioRequest {
    const FAMILY: RequestFamily = RequestFamily::Gradio;

    fn parse(parameters: &str, ctx: &TaskContext) -> Result<Self, CodecError> {
        let params: GradioParameters = decode_parameters(parameters)?;
        Ok(Self {
            task_id: ctx.task_id,
            prompt: params.prompt,
            negative_prompt: params
                .negative_prompt
                .unwrap_or_else(|| DEFAULT_NEGATIVE_PROMPT.to_string()),
            num_inference_steps: params
                .num_inference_steps
                .unwrap_or(DEFAULT_NUM_INFERENCE_STEPS),
            width: params.width.unwrap_or(DEFAULT_WIDTH),
            height: params.height.unwrap_or(DEFAULT_HEIGHT),
            guidance_scale: params.guidance_scale.unwrap_or(DEFAULT_GUIDANCE_SCALE),
            rand_seed: params.rand_seed.unwrap_or(RANDOM_SEED),
        })
    }
}

/// A parsed request for any family.
#[derive(Debug, Clone, PartialEq)]
pub enum WireRequest {
    Gradio(GradioRequest),
}

impl WireRequest {
    /// Parse `parameters` with the codec registered for `family`.
    pub fn parse(
        family: RequestFamily,
        parameters: &str,
        ctx: &TaskContext,
    ) -> Result<Self, CodecError> {
        match family {
            RequestFamily::Gradio => GradioRequest::parse(parameters, ctx).map(Self::Gradio),
        }
    }

    pub fn family(&self) -> RequestFamily {
        match self {
            Self::Gradio(_) => GradioRequest::FAMILY,
        }
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        match self {
            Self::Gradio(request) => request.encode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const CTX: TaskContext = TaskContext { task_id: 7 };

    #[test]
    fn gradio_fills_defaults_for_omitted_fields() {
        let request =
            WireRequest::parse(RequestFamily::Gradio, r#"{"prompt":"a cat","model":"demoModel"}"#, &CTX)
                .unwrap();

        assert_eq!(request.family(), RequestFamily::Gradio);
        let WireRequest::Gradio(gradio) = request;
        assert_eq!(
            gradio,
            GradioRequest {
                task_id: 7,
                prompt: "a cat".into(),
                negative_prompt: DEFAULT_NEGATIVE_PROMPT.into(),
                num_inference_steps: 20,
                width: 512,
                height: 512,
                guidance_scale: 7,
                rand_seed: RANDOM_SEED,
            }
        );
    }

    #[test]
    fn gradio_keeps_caller_supplied_values() {
        let params = r#"{
            "prompt": "a lighthouse",
            "negative_prompt": "blurry",
            "num_inference_steps": 35,
            "width": 768,
            "height": 640,
            "guidance_scale": 9,
            "rand_seed": 1234
        }"#;
        let gradio = GradioRequest::parse(params, &CTX).unwrap();
        assert_eq!(gradio.negative_prompt, "blurry");
        assert_eq!(gradio.num_inference_steps, 35);
        assert_eq!((gradio.width, gradio.height), (768, 640));
        assert_eq!(gradio.guidance_scale, 9);
        assert_eq!(gradio.rand_seed, 1234);
    }

    #[test]
    fn missing_prompt_is_parse_error() {
        let err = GradioRequest::parse(r#"{"model":"demoModel"}"#, &CTX).unwrap_err();
        assert_matches!(&err, CodecError::Parse(msg) if msg.contains("prompt"));
    }

    #[test]
    fn mistyped_fields_are_parse_errors() {
        assert_matches!(
            GradioRequest::parse(r#"{"prompt": 42}"#, &CTX),
            Err(CodecError::Parse(_))
        );
        assert_matches!(
            GradioRequest::parse(r#"{"prompt": "x", "width": "wide"}"#, &CTX),
            Err(CodecError::Parse(_))
        );
    }

    #[test]
    fn non_json_parameters_are_parse_errors() {
        assert_matches!(GradioRequest::parse("prompt=cat", &CTX), Err(CodecError::Parse(_)));
    }

    #[test]
    fn encoded_request_decodes_to_same_fields() {
        let request =
            WireRequest::parse(RequestFamily::Gradio, r#"{"prompt":"a cat","width":640}"#, &CTX)
                .unwrap();
        let wire = request.encode().unwrap();

        let json: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(json["task_id"], 7);
        assert_eq!(json["prompt"], "a cat");
        assert_eq!(json["width"], 640);
        assert_eq!(json["rand_seed"], -1);
        assert_eq!(json["negative_prompt"], DEFAULT_NEGATIVE_PROMPT);

        let decoded: GradioRequest = serde_json::from_str(&wire).unwrap();
        assert_eq!(WireRequest::Gradio(decoded), request);
    }
}

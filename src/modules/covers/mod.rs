//! Book cover generation: form model, prompt building, the outbound
//! generation call, and local download.

pub mod client;
pub mod download;
pub mod models;
pub mod prompt;
pub mod routes;
pub mod workspace;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookcover_kernel::{settings::Settings, InitCtx, Module};
use serde_json::json;

use client::{CoverGenerator, HttpGenerationClient};
use download::DownloadHelper;
use prompt::{PromptBuilder, PromptTemplate};
use routes::CoversState;
use workspace::CoverWorkspace;

/// Covers module: one shared workspace behind `/api/covers`
pub struct CoversModule {
    state: CoversState,
    endpoint: String,
}

impl CoversModule {
    /// Wire the module against the configured HTTP endpoint
    pub fn from_settings(settings: &Settings) -> Self {
        let endpoint = settings.generation.endpoint();
        let generator = Arc::new(HttpGenerationClient::new(endpoint.clone()));
        Self::with_generator(settings, generator, endpoint)
    }

    /// Wire the module against any generator
    pub fn with_generator(
        settings: &Settings,
        generator: Arc<dyn CoverGenerator>,
        endpoint: impl Into<String>,
    ) -> Self {
        let builder = PromptBuilder::new(PromptTemplate::from(&settings.prompt));
        Self {
            state: CoversState {
                workspace: Arc::new(CoverWorkspace::new(builder, generator)),
                downloads: DownloadHelper::new(settings.download.fallback_name.clone()),
            },
            endpoint: endpoint.into(),
        }
    }

    pub fn workspace(&self) -> &Arc<CoverWorkspace> {
        &self.state.workspace
    }
}

#[async_trait]
impl Module for CoversModule {
    fn name(&self) -> &'static str {
        "covers"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            endpoint = %self.endpoint,
            emphasis = ?ctx.settings.prompt.emphasis,
            "covers module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "covers module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let in_progress = self.state.workspace.view().await.in_progress;
        tracing::info!(module = self.name(), in_progress, "covers module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{}", schema) }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let view = json_response("Current form and status", "WorkspaceView");
    let generated = json!({
        "summary": "Generate a cover from the current form",
        "tags": ["Covers"],
        "responses": {
            "200": json_response("Generated image", "GeneratedCover"),
            "409": error_response("A generation attempt is already running"),
            "422": error_response("Title or genre missing"),
            "502": error_response("The image endpoint failed")
        }
    });

    json!({
        "paths": {
            "/health": {
                "get": {
                    "summary": "Covers health check",
                    "tags": ["Covers"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            },
            "/options": {
                "get": {
                    "summary": "Genres and suggestion lists",
                    "tags": ["Covers"],
                    "responses": { "200": json_response("Form options", "FormOptions") }
                }
            },
            "/form": {
                "get": {
                    "summary": "Read the form",
                    "tags": ["Covers"],
                    "responses": { "200": view.clone() }
                },
                "patch": {
                    "summary": "Set any subset of form fields",
                    "tags": ["Covers"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/CoverForm" }
                            }
                        }
                    },
                    "responses": {
                        "200": view.clone(),
                        "400": error_response("Malformed body or unknown field")
                    }
                },
                "delete": {
                    "summary": "Reset the form and result",
                    "tags": ["Covers"],
                    "responses": { "200": view.clone() }
                }
            },
            "/form/{field}": {
                "put": {
                    "summary": "Set one form field",
                    "tags": ["Covers"],
                    "parameters": [{
                        "name": "field",
                        "in": "path",
                        "required": true,
                        "schema": {
                            "type": "string",
                            "enum": [
                                "title", "author", "genre", "mood", "colors",
                                "art_style", "visual_elements", "target_audience"
                            ]
                        }
                    }],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": { "value": { "type": "string" } },
                                    "required": ["value"]
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": view,
                        "400": error_response("Unknown field or malformed body")
                    }
                }
            },
            "/prompt": {
                "get": {
                    "summary": "Preview the prompt for the current form",
                    "tags": ["Covers"],
                    "responses": {
                        "200": json_response("Prompt text", "PromptPreview"),
                        "422": error_response("Title or genre missing")
                    }
                }
            },
            "/generate": { "post": generated.clone() },
            "/regenerate": { "post": generated },
            "/download": {
                "get": {
                    "summary": "Download the generated cover",
                    "tags": ["Covers"],
                    "responses": {
                        "200": {
                            "description": "PNG attachment named after the title",
                            "content": {
                                "image/png": { "schema": { "type": "string", "format": "binary" } }
                            }
                        },
                        "307": { "description": "Image could not be fetched; follow the link" },
                        "404": error_response("Nothing generated yet")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "CoverForm": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Required; rendered verbatim" },
                        "author": { "type": "string", "description": "Placeholder used when empty" },
                        "genre": { "type": "string", "description": "One of the listed genres" },
                        "mood": { "type": "string" },
                        "colors": { "type": "string" },
                        "art_style": { "type": "string" },
                        "visual_elements": { "type": "string" },
                        "target_audience": { "type": "string" }
                    }
                },
                "WorkspaceView": {
                    "type": "object",
                    "properties": {
                        "form": { "$ref": "#/components/schemas/CoverForm" },
                        "echo": {
                            "type": "object",
                            "properties": {
                                "title_chars": { "type": "integer" },
                                "author_chars": { "type": "integer" }
                            }
                        },
                        "issues": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "field": { "type": "string" },
                                    "problem": { "type": "string" }
                                }
                            }
                        },
                        "in_progress": { "type": "boolean" },
                        "can_generate": { "type": "boolean" },
                        "result": {
                            "type": "object",
                            "properties": {
                                "status": { "type": "string", "enum": ["image", "failed"] },
                                "imageUrl": { "type": "string" },
                                "message": { "type": "string" }
                            }
                        }
                    },
                    "required": ["form", "echo", "issues", "in_progress", "can_generate"]
                },
                "GeneratedCover": {
                    "type": "object",
                    "properties": { "imageUrl": { "type": "string" } },
                    "required": ["imageUrl"]
                },
                "PromptPreview": {
                    "type": "object",
                    "properties": { "prompt": { "type": "string" } },
                    "required": ["prompt"]
                },
                "FormOptions": {
                    "type": "object",
                    "properties": {
                        "genres": { "type": "array", "items": { "type": "string" } },
                        "moods": { "type": "array", "items": { "type": "string" } },
                        "art_styles": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }
    })
}

/// Create the covers module from settings
pub fn create_module(settings: &Settings) -> Arc<dyn Module> {
    Arc::new(CoversModule::from_settings(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_is_named_covers_and_documents_its_routes() {
        let module = CoversModule::from_settings(&Settings::default());
        assert_eq!(module.name(), "covers");

        let spec = module.openapi().unwrap();
        for path in [
            "/form",
            "/form/{field}",
            "/prompt",
            "/generate",
            "/regenerate",
            "/download",
            "/options",
        ] {
            assert!(spec["paths"][path].is_object(), "missing {}", path);
        }
        assert!(spec["components"]["schemas"]["WorkspaceView"].is_object());
    }

    #[test]
    fn module_uses_configured_endpoint_and_template() {
        let mut settings = Settings::default();
        settings.generation.base_url = "https://covers.example".to_string();
        settings.prompt.placeholder_author = "Anonymous".to_string();

        let module = CoversModule::from_settings(&settings);
        assert_eq!(module.endpoint, "https://covers.example/api/generate-cover");
        assert_eq!(
            module.workspace().builder().template().placeholder_author,
            "Anonymous"
        );
    }
}

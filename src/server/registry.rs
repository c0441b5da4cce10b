//! In-memory tool, resource and prompt registry

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{CallToolResult, Prompt, PromptMessage, Resource, ResourceContents, ResourceTemplate, Tool};
use crate::utils::{match_template, template_pattern};

use super::service::{ServerService, ServiceRequest, ServiceResponse};
use super::InvocationContext;

type ToolFn = Arc<dyn Fn(InvocationContext, Value) -> BoxFuture<'static, Result<CallToolResult>> + Send + Sync>;

type ResourceFn = Arc<
    dyn Fn(InvocationContext, String, HashMap<String, String>) -> BoxFuture<'static, Result<Vec<ResourceContents>>>
        + Send
        + Sync,
>;

type PromptFn = Arc<dyn Fn(&HashMap<String, String>) -> Result<Vec<PromptMessage>> + Send + Sync>;

struct ToolEntry {
    tool: Tool,
    handler: ToolFn,
}

struct ResourceEntry {
    resource: Resource,
    listed: bool,
    handler: ResourceFn,
}

struct TemplateEntry {
    template: ResourceTemplate,
    pattern: Regex,
    listed: bool,
    handler: ResourceFn,
}

struct PromptEntry {
    prompt: Prompt,
    render: PromptFn,
}

/// A [`ServerService`] backed by registered closures.
///
/// Resources and templates declare whether they appear in listings; a
/// template that is not listed is still readable through a matching URI.
#[derive(Default)]
pub struct Registry {
    tools: Vec<ToolEntry>,
    resources: Vec<ResourceEntry>,
    templates: Vec<TemplateEntry>,
    prompts: Vec<PromptEntry>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Arguments arrive as a JSON object (`{}` when absent).
    pub fn with_tool<F, Fut>(mut self, tool: Tool, handler: F) -> Self
    where
        F: Fn(InvocationContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult>> + Send + 'static,
    {
        self.tools.push(ToolEntry {
            tool,
            handler: Arc::new(move |ctx, args| handler(ctx, args).boxed()),
        });
        self
    }

    /// Register a resource at a fixed URI
    pub fn with_resource<F, Fut>(mut self, resource: Resource, listed: bool, handler: F) -> Self
    where
        F: Fn(InvocationContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<ResourceContents>>> + Send + 'static,
    {
        self.resources.push(ResourceEntry {
            resource,
            listed,
            handler: Arc::new(move |ctx, uri, _| handler(ctx, uri).boxed()),
        });
        self
    }

    /// Register a resource template; the handler receives the matched variables
    pub fn with_resource_template<F, Fut>(mut self, template: ResourceTemplate, listed: bool, handler: F) -> Result<Self>
    where
        F: Fn(InvocationContext, String, HashMap<String, String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<ResourceContents>>> + Send + 'static,
    {
        let pattern = template_pattern(&template.uri_template)?;
        self.templates.push(TemplateEntry {
            template,
            pattern,
            listed,
            handler: Arc::new(move |ctx, uri, params| handler(ctx, uri, params).boxed()),
        });
        Ok(self)
    }

    /// Register a prompt
    pub fn with_prompt<F>(mut self, prompt: Prompt, render: F) -> Self
    where
        F: Fn(&HashMap<String, String>) -> Result<Vec<PromptMessage>> + Send + Sync + 'static,
    {
        self.prompts.push(PromptEntry {
            prompt,
            render: Arc::new(render),
        });
        self
    }

    /// Whether any tools are registered
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Whether any resources or templates are registered
    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty() || !self.templates.is_empty()
    }

    /// Whether any prompts are registered
    pub fn has_prompts(&self) -> bool {
        !self.prompts.is_empty()
    }

    async fn call_tool(&self, ctx: InvocationContext, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let entry = self
            .tools
            .iter()
            .find(|t| t.tool.name == name)
            .ok_or_else(|| Error::NotFound(format!("Tool not found: {}", name)))?;
        let arguments = arguments.unwrap_or_else(|| Value::Object(Default::default()));
        (entry.handler)(ctx, arguments).await
    }

    async fn read_resource(&self, ctx: InvocationContext, uri: String) -> Result<Vec<ResourceContents>> {
        if let Some(entry) = self.resources.iter().find(|r| r.resource.uri == uri) {
            return (entry.handler)(ctx, uri, HashMap::new()).await;
        }
        for entry in &self.templates {
            if let Some(params) = match_template(&entry.pattern, &uri) {
                debug!("{} matched template {}", uri, entry.template.uri_template);
                return (entry.handler)(ctx, uri, params).await;
            }
        }
        Err(Error::NotFound(format!("Resource not found: {}", uri)))
    }

    fn get_prompt(&self, name: &str, arguments: &HashMap<String, String>) -> Result<ServiceResponse> {
        let entry = self
            .prompts
            .iter()
            .find(|p| p.prompt.name == name)
            .ok_or_else(|| Error::NotFound(format!("Prompt not found: {}", name)))?;

        if let Some(missing) = entry
            .prompt
            .arguments
            .iter()
            .find(|a| a.required && !arguments.contains_key(&a.name))
        {
            return Err(Error::InvalidParams(format!(
                "Missing required argument {} for prompt {}",
                missing.name, name
            )));
        }

        Ok(ServiceResponse::GetPrompt {
            messages: (entry.render)(arguments)?,
            description: entry.prompt.description.clone(),
        })
    }
}

#[async_trait]
impl ServerService for Registry {
    async fn handle_request(&self, context: InvocationContext, request: ServiceRequest) -> Result<ServiceResponse> {
        match request {
            ServiceRequest::ListTools => Ok(ServiceResponse::ListTools {
                tools: self.tools.iter().map(|t| t.tool.clone()).collect(),
            }),
            ServiceRequest::CallTool { name, arguments } => Ok(ServiceResponse::CallTool {
                result: self.call_tool(context, &name, arguments).await?,
            }),
            ServiceRequest::ListResources => Ok(ServiceResponse::ListResources {
                resources: self
                    .resources
                    .iter()
                    .filter(|r| r.listed)
                    .map(|r| r.resource.clone())
                    .collect(),
            }),
            ServiceRequest::ListResourceTemplates => Ok(ServiceResponse::ListResourceTemplates {
                templates: self
                    .templates
                    .iter()
                    .filter(|t| t.listed)
                    .map(|t| t.template.clone())
                    .collect(),
            }),
            ServiceRequest::ReadResource { uri } => Ok(ServiceResponse::ReadResource {
                contents: self.read_resource(context, uri).await?,
            }),
            ServiceRequest::ListPrompts => Ok(ServiceResponse::ListPrompts {
                prompts: self.prompts.iter().map(|p| p.prompt.clone()).collect(),
            }),
            ServiceRequest::GetPrompt { name, arguments } => self.get_prompt(&name, &arguments),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tools", &self.tools.iter().map(|t| &t.tool.name).collect::<Vec<_>>())
            .field("resources", &self.resources.iter().map(|r| &r.resource.uri).collect::<Vec<_>>())
            .field(
                "templates",
                &self.templates.iter().map(|t| &t.template.uri_template).collect::<Vec<_>>(),
            )
            .field("prompts", &self.prompts.iter().map(|p| &p.prompt.name).collect::<Vec<_>>())
            .finish()
    }
}

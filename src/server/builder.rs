//! Builder for configuring and creating MCP servers

use super::{Server, ServerOptions, ServerService};

/// Builder for creating and configuring MCP servers
#[derive(Default)]
pub struct ServerBuilder {
    /// Server options
    options: ServerOptions,
}

impl ServerBuilder {
    /// Create a new server builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server implementation name and version
    pub fn with_implementation(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.options.implementation.name = name.into();
        self.options.implementation.version = version.into();
        self
    }

    /// Set server instructions for clients
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.options.instructions = Some(instructions.into());
        self
    }

    /// Set the default timeout for nested requests in milliseconds
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.options.default_timeout_ms = timeout_ms;
        self
    }

    /// Enable logging capability
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.options.capabilities.logging = enable;
        self
    }

    /// Enable prompts capability
    pub fn with_prompts(mut self, enable: bool) -> Self {
        self.options.capabilities.prompts = enable;
        self
    }

    /// Enable resources capability
    pub fn with_resources(mut self, enable: bool) -> Self {
        self.options.capabilities.resources = enable;
        self
    }

    /// Enable tools capability
    pub fn with_tools(mut self, enable: bool) -> Self {
        self.options.capabilities.tools = enable;
        self
    }

    /// Build the server with the provided service implementation
    pub fn build(self, service: impl ServerService + 'static) -> Server {
        Server::new(self.options, service)
    }
}

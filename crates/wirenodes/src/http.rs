use async_trait::async_trait;
use serde_json::Value;
use wirecore::{NodeConfig, NodeContext, NodeError, NodeExecutor, WorkflowMessage};

const SUPPORTED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Outbound request node. `config.method`/`config.url` drive the request; a
/// literal `{{payload}}` in the URL is substituted with the message payload,
/// and for POST/PUT/PATCH the payload is sent as the JSON body. The response
/// body (parsed as JSON when possible) is forwarded on output 0 with the
/// status code in metadata; transport failures end the branch as contained
/// errors.
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeExecutor for HttpRequestNode {
    fn node_type(&self) -> &str {
        "http-request"
    }

    fn validate_config(&self, node: &NodeConfig) -> Result<(), NodeError> {
        node.config_str("url")
            .ok_or_else(|| NodeError::Configuration("missing config 'url'".to_string()))?;
        let method = node.config_str("method").unwrap_or("GET").to_uppercase();
        if !SUPPORTED_METHODS.contains(&method.as_str()) {
            return Err(NodeError::Configuration(format!(
                "unsupported method: {}",
                method
            )));
        }
        Ok(())
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        let url_template = ctx.require_config_str("url")?;
        let url = substitute_payload(url_template, &msg.payload);
        let method = ctx.config_str("method").unwrap_or("GET").to_uppercase();

        ctx.log(format!("{} {}", method, url));

        let mut request = match method.as_str() {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url).json(&msg.payload),
            "PUT" => self.client.put(&url).json(&msg.payload),
            "PATCH" => self.client.patch(&url).json(&msg.payload),
            "DELETE" => self.client.delete(&url),
            other => {
                return Err(NodeError::Configuration(format!(
                    "unsupported method: {}",
                    other
                )))
            }
        };

        if let Some(Value::Object(headers)) = ctx.config_value("headers") {
            for (key, value) in headers {
                if let Some(text) = value.as_str() {
                    request = request.header(key.as_str(), text);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| NodeError::Http(format!("failed to read response: {}", e)))?;

        ctx.log(format!("response status: {}", status));

        let payload = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        ctx.send(
            msg.derived(payload).with_metadata("status", status),
            0,
        )
        .await;
        Ok(())
    }
}

/// Replace a literal `{{payload}}` marker with the payload rendered as text.
fn substitute_payload(template: &str, payload: &Value) -> String {
    if !template.contains("{{payload}}") {
        return template.to_string();
    }
    let rendered = match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    template.replace("{{payload}}", &rendered)
}

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

pub struct TemplateEngine {
    template_dir: PathBuf,
    cache: Arc<RwLock<HashMap<String, CachedTemplate>>>,
}

struct CachedTemplate {
    content: String,
    modified: SystemTime,
}

impl TemplateEngine {
    pub fn new(template_dir: PathBuf) -> Self {
        Self {
            template_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn load_template(&self, path: &str) -> Result<String, String> {
        let template_path = self.template_dir.join(path);

        let metadata = tokio::fs::metadata(&template_path)
            .await
            .map_err(|e| format!("Failed to get metadata for {}: {}", path, e))?;

        let modified = metadata
            .modified()
            .map_err(|e| format!("Failed to get modified time: {}", e))?;

        let mut cache = self.cache.write().await;

        if let Some(cached) = cache.get(path)
            && cached.modified >= modified
        {
            debug!("Using cached template for {}", path);
            return Ok(cached.content.clone());
        }

        info!("Loading template: {}", path);

        let content = tokio::fs::read_to_string(&template_path)
            .await
            .map_err(|e| format!("Failed to read template {}: {}", path, e))?;

        cache.insert(
            path.to_string(),
            CachedTemplate {
                content: content.clone(),
                modified,
            },
        );

        Ok(content)
    }

    /// Render `template_name` with `globals`, after rendering the shared header
    /// and footer with the same globals and exposing them as `header` / `footer`.
    pub async fn render_template(
        &self,
        template_name: &str,
        globals: liquid::Object,
    ) -> Result<String, String> {
        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| format!("Failed to create parser: {}", e))?;

        let header = self.render_partial(&parser, "_header.html.liquid", &globals).await;
        let footer = self.render_partial(&parser, "_footer.html.liquid", &globals).await;

        let template_content = self.load_template(template_name).await?;
        let template = parser
            .parse(&template_content)
            .map_err(|e| format!("Failed to parse template: {}", e))?;

        let mut full_globals = globals;
        full_globals.insert("header".into(), liquid::model::Value::Scalar(header.into()));
        full_globals.insert("footer".into(), liquid::model::Value::Scalar(footer.into()));

        template
            .render(&full_globals)
            .map_err(|e| format!("Failed to render template: {}", e))
    }

    pub async fn render_page(&self, template_name: &str, globals: liquid::Object) -> Response {
        match self.render_template(template_name, globals).await {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("Template rendering error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    async fn render_partial(
        &self,
        parser: &liquid::Parser,
        name: &str,
        globals: &liquid::Object,
    ) -> String {
        let content = match self.load_template(name).await {
            Ok(content) => content,
            Err(e) => {
                error!("Failed to load {}: {}", name, e);
                return String::new();
            }
        };

        match parser.parse(&content).and_then(|template| template.render(globals)) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!("Failed to render {}: {}", name, e);
                String::new()
            }
        }
    }
}

//! Rendering of transactional and newsletter emails.
//!
//! Every email has an HTML and a plain-text body, rendered from `<name>.html` and `<name>.txt`
//! templates embedded in the binary. HTML templates are autoescaped by Tera.
use serde::Serialize;
use tera::{Context, Tera};

pub const NEWSLETTER_TEMPLATE: &str = "newsletter";

#[derive(thiserror::Error, Debug)]
#[error("Failed to render the `{template}` email template")]
pub struct TemplateError {
    template: String,
    #[source]
    source: tera::Error,
}

impl TemplateError {
    pub fn new(template: impl Into<String>, source: tera::Error) -> Self {
        Self {
            template: template.into(),
            source,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

pub trait EmailRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Context) -> Result<RenderedEmail, TemplateError>;
}

pub struct TeraEmailRenderer {
    templates: Tera,
}

impl TeraEmailRenderer {
    pub fn new() -> Result<Self, TemplateError> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(vec![
                (
                    "newsletter.html",
                    include_str!("../templates/emails/newsletter.html"),
                ),
                (
                    "newsletter.txt",
                    include_str!("../templates/emails/newsletter.txt"),
                ),
            ])
            .map_err(|e| TemplateError::new(NEWSLETTER_TEMPLATE, e))?;
        Ok(Self { templates })
    }
}

impl EmailRenderer for TeraEmailRenderer {
    fn render(&self, template: &str, context: &Context) -> Result<RenderedEmail, TemplateError> {
        let html = self
            .templates
            .render(&format!("{template}.html"), context)
            .map_err(|e| TemplateError::new(template, e))?;
        let text = self
            .templates
            .render(&format!("{template}.txt"), context)
            .map_err(|e| TemplateError::new(template, e))?;
        Ok(RenderedEmail { html, text })
    }
}

/// The data a newsletter email is rendered from, personalised per subscriber.
#[derive(Debug, Serialize)]
pub struct NewsletterEmail<'a> {
    pub title: &'a str,
    pub paragraphs: &'a [String],
    pub unsubscribe_link: &'a str,
}

impl NewsletterEmail<'_> {
    pub fn context(&self) -> Result<Context, TemplateError> {
        Context::from_serialize(self).map_err(|e| TemplateError::new(NEWSLETTER_TEMPLATE, e))
    }
}

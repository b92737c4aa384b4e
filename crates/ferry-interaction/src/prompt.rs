//! Prompt rendering for generation backends.

use ferry_core::{FerryError, GenerationRequest, Result};
use minijinja::{Environment, context};

/// Default system prompt. Rendered with the fields of a `GenerationRequest`.
pub const DEFAULT_SYSTEM_TEMPLATE: &str = r#"你叫{{ persona }}，正在{% if kind == "group" %}群聊「{{ partner }}」里{% else %}和{{ partner }}私聊{% endif %}聊天，语气{{ tone }}。
{% if style == "technical" %}对方在问技术问题，请用一行回答，可以详细，但不要换行，不要使用表情。
{%- else %}请像平时聊天一样简短回复，最多两行，每行不超过十个字，不要添加标点符号和表情。
{%- endif %}
{% if meme_injection and idioms %}可以自然地用上这些说法：{{ idioms | join("、") }}。
{% endif %}
{%- if avoid %}不要重复你最近说过的话：
{% for line in avoid %}- {{ line }}
{% endfor %}
{%- endif %}如果相关主题回复过，或你决定不说话，请说：本轮不发言。
可以另起一行，以“备选:”开头给出一个不同的说法。
聊天记录包含了你和{% if kind == "group" %}群友{% else %}对方{% endif %}最近的发言。"#;

/// Renders system prompts and user messages.
#[derive(Debug)]
pub struct PromptRenderer {
    env: Environment<'static>,
    template: String,
}

impl PromptRenderer {
    /// Creates a renderer with the built-in template.
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
            template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
        }
    }

    /// Creates a renderer with a custom system template.
    ///
    /// The template is compiled once here so syntax errors surface at startup.
    pub fn with_template(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        Environment::new()
            .template_from_str(&template)
            .map(|_| ())
            .map_err(|e| FerryError::template(e.to_string()))?;
        Ok(Self {
            env: Environment::new(),
            template,
        })
    }

    pub fn system_prompt(&self, request: &GenerationRequest) -> Result<String> {
        self.env
            .render_str(
                &self.template,
                context! {
                    persona => &request.persona,
                    partner => &request.partner,
                    kind => request.kind,
                    style => request.style,
                    tone => &request.tone,
                    meme_injection => request.meme_injection,
                    idioms => &request.idioms,
                    avoid => &request.avoid,
                },
            )
            .map_err(|e| FerryError::template(e.to_string()))
    }

    /// The conversation as `sender: text` lines, ending with the incoming message.
    pub fn user_message(&self, request: &GenerationRequest) -> String {
        request
            .context
            .iter()
            .map(|line| (line.sender.as_str(), line.text.as_str()))
            .chain(std::iter::once((
                request.sender.as_str(),
                request.incoming.as_str(),
            )))
            .map(|(sender, text)| format!("{}: {}", sender, flatten(text)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::config::{ChatPartner, PersonaConfig};
    use ferry_core::message::Message;
    use ferry_core::style::StyleClass;

    fn request(style: StyleClass) -> GenerationRequest {
        let config = PersonaConfig::new(
            "小渡",
            ChatPartner::Group {
                label: "开发群".to_string(),
            },
        );
        let earlier = Message::text("阿强", "晚上\n吃啥");
        let incoming = Message::text("小美", "@小渡 你说呢");
        GenerationRequest::new(&config, style, &incoming)
            .with_context([&earlier])
            .with_avoid(vec!["火锅吧".to_string()])
    }

    #[test]
    fn test_default_template_casual() {
        let prompt = PromptRenderer::new()
            .system_prompt(&request(StyleClass::Casual))
            .unwrap();
        assert!(prompt.starts_with("你叫小渡，正在群聊「开发群」里聊天"));
        assert!(prompt.contains("每行不超过十个字"));
        assert!(prompt.contains("绝了、好家伙"));
        assert!(prompt.contains("- 火锅吧"));
        assert!(prompt.contains("本轮不发言"));
        assert!(!prompt.contains("技术问题"));
    }

    #[test]
    fn test_default_template_technical() {
        let prompt = PromptRenderer::new()
            .system_prompt(&request(StyleClass::Technical))
            .unwrap();
        assert!(prompt.contains("技术问题"));
    }

    #[test]
    fn test_user_message_flattens_lines() {
        let message = PromptRenderer::new().user_message(&request(StyleClass::Casual));
        assert_eq!(message, "阿强: 晚上 吃啥\n小美: @小渡 你说呢");
    }

    #[test]
    fn test_custom_template() {
        let renderer = PromptRenderer::with_template("{{ persona }}/{{ style }}").unwrap();
        assert_eq!(
            renderer.system_prompt(&request(StyleClass::Technical)).unwrap(),
            "小渡/technical"
        );

        let err = PromptRenderer::with_template("{% if %}").unwrap_err();
        assert!(matches!(err, FerryError::Template(_)));
    }
}

use log::debug;
use strum::EnumMessage;

use crate::{
    analysis::{AnalysisInvoker, AnalysisReport, AnalysisRequest},
    error::SbResult,
    llm,
    llm::{ChatCompletionOptions, ChatMessage, ChatRoute, Role},
    utils,
};

/// Invoker backed by an OpenAI-compatible chat provider
pub struct LlmInvoker;

impl AnalysisInvoker for LlmInvoker {
    async fn run(&self, request: &AnalysisRequest) -> SbResult<AnalysisReport> {
        let prompt = build_prompt(request);
        debug!("[LlmInvoker Prompt] {prompt}");

        let messages: Vec<ChatMessage> = vec![
            ChatMessage {
                role: Role::System,
                content: LLM_SYSTEM.to_string(),
                reasoning: None,
            },
            ChatMessage {
                role: Role::User,
                content: prompt,
                reasoning: None,
            },
        ];

        let route = ChatRoute {
            provider: request.llm_provider.clone(),
            model: request.llm_model.clone(),
        };

        let bot_message =
            llm::chat_completion_routed(&route, &messages, &ChatCompletionOptions::default())
                .await?;
        debug!("[LlmInvoker LLM] {bot_message:?}");

        let json_str = utils::markdown::extract_code_block(&bot_message.content);
        let report = AnalysisReport::from_json(&json_str)?;

        Ok(report)
    }
}

fn build_prompt(request: &AnalysisRequest) -> String {
    let params = &request.params;

    let market = params.market_type.get_message().unwrap_or_default();

    let mut angles: Vec<String> = params
        .analysts
        .iter()
        .map(|analyst| format!("- {}", analyst.focus()))
        .collect();
    if params.include_sentiment {
        angles.push("- 市场情绪：结合整体市场情绪水平评估短期风险偏好".to_string());
    }
    if params.include_risk_assessment {
        angles.push("- 风险评估：给出主要风险点及其对评级的影响".to_string());
    }
    let angles = angles.join("\n");

    let custom = params
        .custom_prompt
        .as_deref()
        .map(|s| format!("\n补充要求：{s}\n"))
        .unwrap_or_default();

    format!(
        r#"
请对{market}标的 {symbol} 截至 {date} 的投资价值进行综合分析，研究深度为 {depth}/5（1为简要概览，5为深入研究）。

分析需覆盖以下角度：
{angles}
{custom}
{REPORT_JSON_PROMPT}
"#,
        symbol = request.symbol,
        date = params.analysis_date,
        depth = params.research_depth,
    )
}

static LLM_SYSTEM: &str = "你是一名资深的证券投资分析主管，负责汇总各角度的分析结论并给出最终评级。";

static REPORT_JSON_PROMPT: &str = r#"
返回的 JSON 格式示例如下：
```
{
    "prospect": "Bullish" | "Bearish" | "Neutral",
    "rating": 评分为0到100之间的整数,
    "summary": "详细阐述分析过程"
}
```

注意以下几点：
- 不要包含任何额外的解释或文本，仅返回 JSON 数据。
- 确保返回的结果是合法的 JSON 格式。
"#;

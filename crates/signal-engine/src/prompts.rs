//! Prompt builders. Prompts are written in Chinese because the covered market
//! and most sources are A-share news.

use finnews_core::SignalAnalysis;

/// Longest article excerpt sent to the model, in characters.
pub const MAX_CONTENT_CHARS: usize = 6000;

pub fn relevance_prompt(title: &str) -> String {
    format!(
        r#"你是A股量化交易员。判断以下新闻标题是否属于"金融、宏观经济、股市、科技、政策"范畴。

标题："{title}"

如果是，请回答"是"。
如果完全无关（如娱乐、体育、纯八卦、小型社会事件等），请回答"否"。
只回答一个字。"#
    )
}

pub fn analysis_prompt(content: &str) -> String {
    let content = truncate_chars(content, MAX_CONTENT_CHARS);
    format!(
        r#"[Role]
你是一个资深量化研究员。你需要分析新闻对A股市场的影响。

[Input News]
{content}

[Instructions]
1. 在输出 JSON 之前，先在 <think> 标签内推演：
   - 一阶影响（直接受益/受损）。
   - 二阶影响（供应链、竞争对手、替代品）。
   - 结合宏观环境（流动性、政策周期）评估信号强度。
2. 思考结束后，输出一个严格的 JSON 对象，字段如下：
   - "reasoning": 简练结论
   - "score": -10 到 10 的整数，正数利好，负数利空
   - "certainty": 0 到 10 的整数
   - "confidence_range": [下界, 上界]，可选
   - "related_stocks": 相关股票代码列表
   - "time_horizon": "Short" | "Medium" | "Long"

[Example Output]
<think>
1. 事件核心是...
2. 传导路径是...
</think>
{{
    "reasoning": "总结上述思考的简练结论...",
    "score": 7,
    "certainty": 8,
    "confidence_range": [5, 8],
    "related_stocks": ["sh.600XXX"],
    "time_horizon": "Medium"
}}"#
    )
}

pub fn critique_prompt(content: &str, signal: &SignalAnalysis) -> String {
    let content = truncate_chars(content, MAX_CONTENT_CHARS);
    let stocks: Vec<&str> = signal.related_stocks().iter().map(String::as_str).collect();
    format!(
        r#"[Role]
你是一名持怀疑态度的风控审查员，任务是反驳下面这份分析。

[Input News]
{content}

[Analysis Under Review]
结论：{reasoning}
评分：{score}（-10 到 10）
确定性：{certainty}（0 到 10）
相关股票：{stocks}
周期：{horizon}

[Instructions]
逐条指出该分析中的逻辑错误、被忽略的风险或遗漏的反向因素。
如果问题严重，请明确写出"严重"。如果分析基本可靠，简要说明即可。"#,
        reasoning = signal.reasoning(),
        score = signal.score(),
        certainty = signal.certainty(),
        stocks = stocks.join(", "),
        horizon = signal.time_horizon(),
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

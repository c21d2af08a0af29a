//! Prompt assembly for dialogue lines and turn-order decisions.

/// Substitute `{key}` placeholders in one pass.
///
/// Unknown placeholders and unmatched braces are left as-is, and substituted
/// values are never re-scanned.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Per-agent system prompt.
pub fn character_system_prompt(
    template: &str,
    name: &str,
    persona: &str,
    scene_setting: &str,
    plot_summary: &str,
) -> String {
    render_template(
        template,
        &[
            ("character_name", name),
            ("character_info", persona),
            ("scene_setting", scene_setting),
            ("plot_summary", plot_summary),
        ],
    )
}

/// Per-turn user prompt asking an agent for its next line.
pub fn character_user_prompt(recent_history: &str, situation: &str, name: &str) -> String {
    format!("\n当前对话历史：\n{recent_history}\n\n当前情况：{situation}\n\n请以{name}的身份回应：\n")
}

/// User prompt for a turn-order decision.
///
/// With `excluded_human` set, the prompt restricts the choice to simulated
/// participants and names the human to avoid.
pub fn decision_user_prompt(
    scene_setting: &str,
    candidates: &[&str],
    recent_history: &str,
    situation: &str,
    excluded_human: Option<&str>,
) -> String {
    let list = candidates.join(", ");
    match excluded_human {
        Some(human) => format!(
            "\n当前场景：{scene_setting}\n\n可选AI角色：{list}\n\n最近对话历史：\n{recent_history}\n\n当前情况：{situation}\n\n请从AI角色中决定下一个应该说话的角色。注意：不要选择用户主角\"{human}\"。\n"
        ),
        None => format!(
            "\n当前场景：{scene_setting}\n\n可选角色：{list}\n\n最近对话历史：\n{recent_history}\n\n当前情况：{situation}\n\n请决定下一个应该说话的角色。\n"
        ),
    }
}

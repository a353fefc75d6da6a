pub const DEFAULT_TASK: &str = "coding or learning";

const PRODUCTIVITY_PROMPT_TEMPLATE: &str = r#"The user said they want to be doing: {task}

You are given {count} captures taken a few seconds apart, oldest first. Each capture stacks these parts top to bottom: {layout}. Decide whether the user is making progress on their stated task by comparing the captures over time.

Signs of progress, by kind of work:
- Coding or building: code or files changing between captures, terminal output moving, an AI coding assistant generating or being reviewed. Identical editors in every capture with no assistant activity is not progress.
- Training models: logs or metrics advancing, notebook cells executing.
- Debugging: stepping, new console output, errors being investigated, alone or with an AI assistant.
- Learning: a lecture playing, pages or slides advancing, notes being written, problems being worked on, including on paper at the desk.
- Notes and documentation: text being written or reorganized.
- Reading and research: scrolling, switching sources, annotating.

Background audio or video is fine while work visibly continues. Treat as not productive: looking down at a phone in the webcam, screens unchanged across all captures with no assistant activity, entertainment or social feeds in focus.

Reply with JSON only: {"productive": "yes" or "no", "reason": "..."}.
Keep the reason to two short sentences, speak to the user as "you" and mention their task.
When productive, open warmly ("Nice work!", "Good progress!") and name what they achieved.
When not productive, open gently ("Hey, I noticed...", "It looks like you might be...") and stay non-judgmental; they may be thinking or resting.
"#;

/// Fills the productivity prompt for a batch of `count` captures whose parts
/// are stacked as `labels` (e.g. `["Monitor 1", "Webcam"]`).
pub fn productivity_prompt(task: &str, count: usize, labels: &[String]) -> String {
    let task = task.trim();
    let task = if task.is_empty() { DEFAULT_TASK } else { task };
    let layout = if labels.is_empty() {
        "Monitor 1".to_string()
    } else {
        labels.join(", ")
    };

    PRODUCTIVITY_PROMPT_TEMPLATE
        .replace("{task}", task)
        .replace("{count}", &count.to_string())
        .replace("{layout}", &layout)
}

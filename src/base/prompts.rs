//! Prompt templates for LLM usage, and the fixed demo content used when the LLM is unavailable.

use std::collections::BTreeMap;

use serde_json::json;

use super::types::{ActionItem, CallAnalysis, EmailDraft, Prospect, Res, Sentiment};

/// Call analysis prompt.
const ANALYSIS_PROMPT: &str = r#####"
Analyze this sales call transcript and provide a detailed analysis:

Contact: {contact}
Transcript: {transcript}

Please provide:
1. Summary (2-3 sentences)
2. Lead score (1-10)
3. Sentiment analysis
4. Key information extracted (budget, timeline, decision makers)
5. Action items with priorities
6. Recommended next steps

Return _just_ the JSON, with no code fences and no other text, in this shape:
{
  "summary": "...",
  "leadScore": 8,
  "sentiment": {"score": 0.8, "label": "positive"},
  "keyInfo": {"budget": "...", "timeline": "...", "decisionMakers": "..."},
  "actionItems": [{"task": "...", "priority": "high", "dueDate": "..."}],
  "nextSteps": "..."
}
"#####;

/// Follow-up email prompt.
const EMAIL_PROMPT: &str = r#####"
Generate a professional follow-up email based on this call analysis:

Contact: {contact}
Analysis: {analysis}

Create a personalized, professional email that:
1. References specific points from our conversation
2. Provides the demo materials mentioned
3. Suggests next steps
4. Maintains enthusiasm while being professional

Return _just_ the JSON, with no code fences and no other text: {"subject": "...", "body": "..."}
"#####;

/// Substitute `{name}` placeholders in one pass over the template; substituted text is never rescanned.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start + 1..];

        match values.iter().find(|(name, _)| tail.starts_with(name) && tail[name.len()..].starts_with('}')) {
            Some((name, value)) => {
                rendered.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                rendered.push('{');
                rest = tail;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Build the analysis prompt for a transcript.
pub fn analysis_prompt(transcript: &str, prospect: &Prospect) -> String {
    render(ANALYSIS_PROMPT, &[("contact", prospect.describe("Unknown").as_str()), ("transcript", transcript.trim())])
}

/// Build the follow-up email prompt for an analysis.
pub fn email_prompt(analysis: &CallAnalysis, prospect: &Prospect) -> Res<String> {
    let analysis = serde_json::to_string(analysis)?;

    Ok(render(EMAIL_PROMPT, &[("contact", prospect.describe("Prospect").as_str()), ("analysis", analysis.as_str())]))
}

// Demo content.

/// Transcript used when a recording cannot be transcribed.
pub const FALLBACK_TRANSCRIPT: &str = r#####"
Hello, this is Sarah from TechCorp. Thank you for taking the time to speak with me today.

Of course! I've been looking into solutions for our customer management system.

Great! Can you tell me about your current challenges?

We're a growing company with about 75 employees. Our current system is really outdated and we're losing track of customer interactions. We need something that can scale with us and integrate with our existing tools.

That sounds exactly like what our platform handles. What's your timeline for making a decision?

We're hoping to have something in place within the next 2 months. Budget-wise, we're looking at around $20,000 to $30,000 annually.

Perfect, that fits well with our enterprise package. Will you be the primary decision maker, or are there others involved?

I'll need to present this to our CEO, Michael, and our head of operations, but I have a lot of influence in this decision.

Excellent. What would be the best way to move forward?

I'd love to see a demo of your system with our specific use case. Could we schedule something for next week?

Absolutely! I'll send you some demo materials today and we can schedule a full presentation.

That sounds perfect. Looking forward to it!
"#####;

/// Transcript processed by the demo endpoint.
pub const DEMO_TRANSCRIPT: &str = r#####"
Hi, this is John from TechStart Inc. Thanks for taking my call today.

Of course! I've been researching sales automation tools for our growing team.

Great! What specific challenges are you facing with your current sales process?

We're a 30-person startup and our sales team is spending too much time on administrative tasks. We need better lead tracking and follow-up automation. Our budget is around $500-1000 per month.

That's exactly what our platform addresses. When would you like to see results?

Ideally within the next month. I'm the head of sales, but our CEO Sarah will need to approve any final decisions.

Perfect. Let me show you how we can cut your admin time by 60%.
"#####;

/// Prospect used by the demo endpoint.
pub fn demo_prospect() -> Prospect {
    Prospect {
        name: Some("John Smith".to_string()),
        company: Some("TechStart Inc".to_string()),
        email: Some("john@techstart.com".to_string()),
    }
}

/// Analysis used when the LLM cannot produce one.
pub fn fallback_analysis() -> CallAnalysis {
    CallAnalysis {
        summary: "Productive call with TechCorp about CRM needs. Strong interest and clear budget/timeline.".to_string(),
        lead_score: 8,
        sentiment: Sentiment {
            score: 0.85,
            label: "positive".to_string(),
        },
        key_info: BTreeMap::from([
            ("budget".to_string(), json!("$20,000-$30,000 annually")),
            ("timeline".to_string(), json!("2 months")),
            ("decisionMakers".to_string(), json!("CEO Michael, Head of Operations, and contact")),
        ]),
        action_items: vec![
            action_item("Send demo materials", "high", "Today"),
            action_item("Schedule full demo presentation", "high", "Next week"),
            action_item("Prepare customized proposal", "medium", "After demo"),
        ],
        next_steps: Some("Send demo materials today, schedule presentation for next week, prepare customized solution proposal".to_string()),
    }
}

fn action_item(task: &str, priority: &str, due_date: &str) -> ActionItem {
    ActionItem {
        task: task.to_string(),
        priority: priority.to_string(),
        due_date: Some(due_date.to_string()),
    }
}

/// Follow-up email used when the LLM cannot produce one.
pub fn fallback_email(prospect: &Prospect) -> EmailDraft {
    let name = prospect.name.as_deref().unwrap_or("there");

    EmailDraft {
        subject: "Demo Materials + Next Steps - TechCorp CRM Solution".to_string(),
        body: format!(
            r#####"Hi {name},

Thank you for the productive conversation today! I was excited to learn about TechCorp's growth and your need for a scalable customer management solution.

As promised, I'm attaching our demo materials that show how our platform handles:
• Customer interaction tracking
• Integration with existing tools
• Scalable architecture for growing teams

Based on your timeline of 2 months and budget range of $20-30K annually, our Enterprise package would be a perfect fit.

I'd love to schedule a customized demo for you, Michael, and your head of operations next week. I can show you exactly how our solution would work with your specific use case.

Would Tuesday or Wednesday afternoon work for a 45-minute presentation?

Best regards,
Sales Team

P.S. I've also included some case studies from similar companies who saw immediate ROI after implementation."#####
        ),
    }
}

// Tests.

//! Project matcher: ranks open project postings for one student.
//!
//! The model is asked for schema-constrained JSON. Its answer is never trusted
//! as-is: unknown or repeated project ids are dropped, scores are clamped to
//! 0..=100 and the list is re-sorted locally.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::generation::{CompletionClient, GenerationRequest, Transport};

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 20;
pub const MAX_PROJECTS: usize = 50;

const SYSTEM_INSTRUCTION: &str = "You match university students to collaborative projects. \
Score each project from 0 to 100 by how well the student's skills and interests fit the \
project's needs, and give a one-sentence reason addressed to the student. Only use the \
project ids you are given.";

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct StudentProfile {
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ProjectPosting {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MatchRequest {
    /// The student looking for projects.
    pub profile: StudentProfile,
    /// Candidate project postings (at most 50). Ids must be unique.
    pub projects: Vec<ProjectPosting>,
    /// How many matches to return (1-20, default 5).
    pub limit: Option<usize>,
}

/// One ranked project, as returned to callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMatch {
    pub project_id: String,
    pub title: String,
    pub score: f64,
    pub reason: String,
}

/// Element shape the model is asked to produce.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelMatch {
    project_id: String,
    score: f64,
    #[serde(default)]
    reason: String,
}

impl MatchRequest {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.profile.name.trim().is_empty() {
            return Err("profile.name must not be empty".to_string());
        }
        if self.projects.len() > MAX_PROJECTS {
            return Err(format!(
                "{} projects given, limit is {MAX_PROJECTS}",
                self.projects.len()
            ));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit()) {
            return Err(format!("limit must be between 1 and {MAX_LIMIT}"));
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            if project.id.trim().is_empty() {
                return Err("project id must not be empty".to_string());
            }
            if !seen.insert(project.id.as_str()) {
                return Err(format!("duplicate project id: {}", project.id));
            }
        }
        Ok(())
    }

    pub fn to_generation_request(&self) -> GenerationRequest {
        GenerationRequest::prompt(render_prompt(&self.profile, &self.projects))
            .with_system_instruction(SYSTEM_INSTRUCTION)
            .with_json_schema(response_schema())
    }
}

/// Schema for `responseSchema`, in the endpoint's OpenAPI subset.
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "projectId": { "type": "STRING" },
                "score": { "type": "NUMBER" },
                "reason": { "type": "STRING" }
            },
            "required": ["projectId", "score", "reason"]
        }
    })
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none listed".to_string()
    } else {
        items.join(", ")
    }
}

fn render_prompt(profile: &StudentProfile, projects: &[ProjectPosting]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Student: {}", profile.name.trim());
    let _ = writeln!(out, "Skills: {}", join_or_none(&profile.skills));
    let _ = writeln!(out, "Interests: {}", join_or_none(&profile.interests));
    if let Some(bio) = profile.bio.as_deref().filter(|b| !b.trim().is_empty()) {
        let _ = writeln!(out, "Bio: {}", bio.trim());
    }

    out.push_str("\nProjects:\n");
    for project in projects {
        let _ = writeln!(out, "- id: {}", project.id);
        let _ = writeln!(out, "  title: {}", project.title);
        if !project.description.trim().is_empty() {
            let _ = writeln!(out, "  description: {}", project.description.trim());
        }
        let _ = writeln!(
            out,
            "  required skills: {}",
            join_or_none(&project.required_skills)
        );
    }
    out
}

/// Strip a surrounding ```json fence if the model added one despite the schema.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Turn the model's JSON answer into a clean ranking over `projects`.
pub fn rank_matches(
    text: &str,
    projects: &[ProjectPosting],
    limit: usize,
) -> Result<Vec<ProjectMatch>, GenerationError> {
    let raw: Vec<ModelMatch> = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        GenerationError::MalformedResponse(format!("matcher output is not a match list: {e}"))
    })?;

    let index: HashMap<&str, usize> = projects
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), i))
        .collect();

    let mut seen = HashSet::new();
    let mut ranked: Vec<(usize, ProjectMatch)> = Vec::new();
    for m in raw {
        let Some(&i) = index.get(m.project_id.as_str()) else {
            tracing::debug!(project_id = %m.project_id, "dropping unknown project id");
            continue;
        };
        if !seen.insert(i) {
            continue;
        }
        let score = if m.score.is_finite() {
            m.score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        ranked.push((
            i,
            ProjectMatch {
                project_id: projects[i].id.clone(),
                title: projects[i].title.clone(),
                score,
                reason: m.reason.trim().to_string(),
            },
        ));
    }

    ranked.sort_by(|(ia, a), (ib, b)| b.score.total_cmp(&a.score).then(ia.cmp(ib)));
    ranked.truncate(limit);
    Ok(ranked.into_iter().map(|(_, m)| m).collect())
}

/// Rank `req.projects` for `req.profile`. No request is sent when there are no projects.
pub async fn match_projects<T: Transport>(
    client: &CompletionClient<T>,
    req: &MatchRequest,
) -> Result<Vec<ProjectMatch>, GenerationError> {
    if req.projects.is_empty() {
        return Ok(Vec::new());
    }
    let text = client.generate(&req.to_generation_request()).await?;
    rank_matches(&text, &req.projects, req.limit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, title: &str) -> ProjectPosting {
        ProjectPosting {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            required_skills: vec![],
        }
    }

    fn projects() -> Vec<ProjectPosting> {
        vec![
            project("p1", "Campus rover"),
            project("p2", "Study planner app"),
            project("p3", "Solar bench"),
        ]
    }

    #[test]
    fn ranks_by_score_descending() {
        let text = r#"[
            {"projectId":"p1","score":40,"reason":"some robotics"},
            {"projectId":"p2","score":92,"reason":"strong React fit"},
            {"projectId":"p3","score":75,"reason":"energy interest"}
        ]"#;
        let ranked = rank_matches(text, &projects(), 5).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|m| m.project_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3", "p1"]);
        assert_eq!(ranked[0].title, "Study planner app");
    }

    #[test]
    fn drops_unknown_and_duplicate_ids() {
        let text = r#"[
            {"projectId":"p9","score":99,"reason":"made up"},
            {"projectId":"p1","score":50,"reason":"first"},
            {"projectId":"p1","score":80,"reason":"second"}
        ]"#;
        let ranked = rank_matches(text, &projects(), 5).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].reason, "first");
    }

    #[test]
    fn clamps_scores_and_breaks_ties_by_input_order() {
        let text = r#"[
            {"projectId":"p3","score":150,"reason":""},
            {"projectId":"p1","score":120,"reason":""},
            {"projectId":"p2","score":-4,"reason":""}
        ]"#;
        let ranked = rank_matches(text, &projects(), 5).unwrap();
        assert_eq!(ranked[0].project_id, "p1");
        assert_eq!(ranked[0].score, 100.0);
        assert_eq!(ranked[1].project_id, "p3");
        assert_eq!(ranked[2].score, 0.0);
    }

    #[test]
    fn truncates_to_limit() {
        let text = r#"[
            {"projectId":"p1","score":10,"reason":""},
            {"projectId":"p2","score":20,"reason":""},
            {"projectId":"p3","score":30,"reason":""}
        ]"#;
        let ranked = rank_matches(text, &projects(), 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].project_id, "p2");
    }

    #[test]
    fn accepts_fenced_json() {
        let text = "```json\n[{\"projectId\":\"p2\",\"score\":60,\"reason\":\"ok\"}]\n```";
        let ranked = rank_matches(text, &projects(), 5).unwrap();
        assert_eq!(ranked[0].project_id, "p2");
    }

    #[test]
    fn non_json_is_malformed() {
        let err = rank_matches("I think p1 fits best.", &projects(), 5).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn validate_rejects_duplicate_ids_and_bad_limit() {
        let mut req = MatchRequest {
            profile: StudentProfile {
                name: "Ada".to_string(),
                skills: vec!["rust".to_string()],
                interests: vec![],
                bio: None,
            },
            projects: vec![project("p1", "a"), project("p1", "b")],
            limit: None,
        };
        assert!(req.validate().unwrap_err().contains("duplicate"));

        req.projects.pop();
        req.limit = Some(0);
        assert!(req.validate().is_err());
        req.limit = Some(3);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn request_carries_schema_and_profile() {
        let req = MatchRequest {
            profile: StudentProfile {
                name: "Ada".to_string(),
                skills: vec!["rust".to_string(), "embedded".to_string()],
                interests: vec!["robotics".to_string()],
                bio: Some("  ".to_string()),
            },
            projects: projects(),
            limit: None,
        };
        let gen_req = req.to_generation_request();
        let prompt = &gen_req.contents[0].parts[0].text;

        assert!(prompt.contains("Skills: rust, embedded"));
        assert!(prompt.contains("- id: p3"));
        assert!(!prompt.contains("Bio:"));
        let config = gen_req.generation_config.unwrap();
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(config.response_schema.unwrap()["type"], "ARRAY");
    }
}

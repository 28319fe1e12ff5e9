//! Robots.txt parser
//!
//! Only `User-agent` and `Disallow` lines are significant. Consecutive
//! `User-agent` lines share one group; the first group naming an agent is the
//! only group consulted for it.

/// One `User-agent` group and its disallowed path prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Group {
    agents: Vec<String>,
    disallow: Vec<String>,
}

/// Parsed robots.txt document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRobots {
    groups: Vec<Group>,
}

impl ParsedRobots {
    /// Parses raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut collecting_agents = false;

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    if !collecting_agents {
                        groups.push(Group::default());
                        collecting_agents = true;
                    }
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "disallow" => {
                    collecting_agents = false;
                    if let Some(group) = groups.last_mut() {
                        group.disallow.push(value.to_string());
                    }
                }
                _ => collecting_agents = false,
            }
        }

        Self { groups }
    }

    /// A document without rules; everything is permitted
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks whether `path` may be fetched by `user_agent`
    ///
    /// The agent is matched against each group by its product token (the
    /// part before the first `/`), case-insensitively. When no group names
    /// the agent, the `*` group applies.
    pub fn is_permitted(&self, user_agent: &str, path: &str) -> bool {
        let token = product_token(user_agent);
        match self.group_for(&token) {
            Some(group) => group_permits(group, path),
            None if token != "*" => self.is_permitted("*", path),
            None => true,
        }
    }

    fn group_for(&self, token: &str) -> Option<&Group> {
        self.groups
            .iter()
            .find(|group| group.agents.iter().any(|agent| agent == token))
    }
}

fn product_token(user_agent: &str) -> String {
    user_agent
        .split('/')
        .next()
        .unwrap_or(user_agent)
        .trim()
        .to_ascii_lowercase()
}

fn group_permits(group: &Group, path: &str) -> bool {
    !group
        .disallow
        .iter()
        .any(|rule| rule == "/" || (!rule.is_empty() && path.starts_with(rule.as_str())))
}

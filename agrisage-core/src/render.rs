//! Content Renderer — turns an arbitrary, model-authored JSON value into an
//! ordered display tree without a fixed schema.
//!
//! Pure functions only, no I/O. The shape dispatch is an explicit match over
//! the JSON variants: strings and other scalars become leaves, arrays become
//! groups (with a special case for single-key-object elements, which become
//! titled blocks), and objects become groups of titled sections in insertion
//! order. Recursion is capped at [`MAX_RENDER_DEPTH`]; deeper subtrees are
//! truncated to a single leaf holding their compact JSON, so rendering is
//! total even on adversarial nesting.

use serde::Serialize;
use serde_json::Value;

/// Depth cap for untrusted model output. Subtrees at or below this depth are
/// collapsed to one leaf instead of recursing further.
pub const MAX_RENDER_DEPTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayNode {
    /// A scalar value, indented by `depth`.
    Leaf { depth: usize, text: String },
    /// A titled section: a humanized key heading over a rendered body.
    Titled { title: String, body: Box<DisplayNode> },
    /// An ordered run of sibling nodes (array elements or object entries).
    Group { children: Vec<DisplayNode> },
}

impl DisplayNode {
    /// Number of leaves in the tree. For values rendered within the depth
    /// cap this equals the number of scalars reachable in the source JSON.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Titled { body, .. } => body.leaf_count(),
            Self::Group { children } => children.iter().map(Self::leaf_count).sum(),
        }
    }
}

/// Render a JSON value into a display tree. Never mutates its input and is
/// idempotent on the same input.
pub fn render(value: &Value, depth: usize) -> DisplayNode {
    if depth >= MAX_RENDER_DEPTH {
        return DisplayNode::Leaf {
            depth,
            text: value.to_string(),
        };
    }

    match value {
        Value::String(s) => DisplayNode::Leaf {
            depth,
            text: s.clone(),
        },
        Value::Array(items) => DisplayNode::Group {
            children: items
                .iter()
                .map(|item| match item {
                    // a single-key object element reads as a titled block
                    Value::Object(map) if map.len() == 1 => {
                        let (key, inner) = map.iter().next().map(|(k, v)| (k.as_str(), v))
                            .unwrap_or(("", &Value::Null));
                        DisplayNode::Titled {
                            title: humanize_key(key),
                            body: Box::new(render(inner, depth + 1)),
                        }
                    }
                    other => render(other, depth + 1),
                })
                .collect(),
        },
        Value::Object(map) => DisplayNode::Group {
            children: map
                .iter()
                .map(|(key, inner)| DisplayNode::Titled {
                    title: humanize_key(key),
                    body: Box::new(render(inner, depth + 1)),
                })
                .collect(),
        },
        other => DisplayNode::Leaf {
            depth,
            text: other.to_string(),
        },
    }
}

/// How a stored advice text should be displayed: as a rendered tree when it
/// decodes as JSON, verbatim otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum AdviceView {
    Structured { tree: DisplayNode },
    Plain { text: String },
}

pub fn advice_view(raw: &str) -> AdviceView {
    if raw.trim_start().starts_with('{') || raw.trim_start().starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return AdviceView::Structured {
                tree: render(&value, 0),
            };
        }
    }
    AdviceView::Plain {
        text: raw.to_string(),
    }
}

/// Split `**`-marked emphasis spans. Odd segments are emphasized, matching
/// the markup convention in stored diagnosis and advice text.
pub fn emphasis_segments(text: &str) -> Vec<(bool, &str)> {
    text.split("**")
        .enumerate()
        .map(|(i, part)| (i % 2 == 1, part))
        .collect()
}

/// Turn a raw section key into a heading: underscores become spaces, a
/// leading numeric ordering prefix ("0 ") is stripped, and the first letter
/// is uppercased. `"0_best_practices"` → `"Best practices"`.
fn humanize_key(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let digits = spaced.chars().take_while(char::is_ascii_digit).count();
    let stripped = if digits > 0 && spaced[digits..].starts_with(' ') {
        spaced[digits..].trim_start_matches(' ')
    } else {
        spaced.as_str()
    };

    let mut chars = stripped.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_renders_as_leaf() {
        let node = render(&json!("water daily"), 0);
        assert_eq!(
            node,
            DisplayNode::Leaf {
                depth: 0,
                text: "water daily".to_string()
            }
        );
    }

    #[test]
    fn advice_section_example_renders_titled_tree() {
        let value = json!({
            "0_best_practices": {"title": "Watering", "details": "Water daily"}
        });
        let node = render(&value, 0);

        let DisplayNode::Group { children } = node else {
            panic!("expected group at top level");
        };
        assert_eq!(children.len(), 1);
        let DisplayNode::Titled { title, body } = &children[0] else {
            panic!("expected titled section");
        };
        assert_eq!(title, "Best practices");

        let DisplayNode::Group { children: inner } = body.as_ref() else {
            panic!("expected nested group");
        };
        assert_eq!(
            inner[0],
            DisplayNode::Titled {
                title: "Title".to_string(),
                body: Box::new(DisplayNode::Leaf {
                    depth: 2,
                    text: "Watering".to_string()
                }),
            }
        );
        assert_eq!(
            inner[1],
            DisplayNode::Titled {
                title: "Details".to_string(),
                body: Box::new(DisplayNode::Leaf {
                    depth: 2,
                    text: "Water daily".to_string()
                }),
            }
        );
    }

    #[test]
    fn leaf_count_matches_reachable_scalars() {
        let cases = [
            (json!("x"), 1),
            (json!(42), 1),
            (json!(null), 1),
            (json!([]), 0),
            (json!({}), 0),
            (json!(["a", "b", 3]), 3),
            (json!({"a": "1", "b": {"c": "2", "d": [true, false]}}), 4),
            (json!([{"only_key": ["x", "y"]}, "z"]), 3),
        ];
        for (value, expected) in cases {
            assert_eq!(render(&value, 0).leaf_count(), expected, "value: {value}");
        }
    }

    #[test]
    fn single_key_array_element_becomes_titled_block() {
        let value = json!([{"seed_rate": "60 kg/ha"}]);
        let node = render(&value, 0);
        assert_eq!(
            node,
            DisplayNode::Group {
                children: vec![DisplayNode::Titled {
                    title: "Seed rate".to_string(),
                    body: Box::new(DisplayNode::Leaf {
                        depth: 1,
                        text: "60 kg/ha".to_string()
                    }),
                }]
            }
        );
    }

    #[test]
    fn multi_key_array_element_renders_directly() {
        let value = json!([{"a": "1", "b": "2"}]);
        let DisplayNode::Group { children } = render(&value, 0) else {
            panic!("expected group");
        };
        // not a titled block: the element is rendered as its own group
        assert!(matches!(children[0], DisplayNode::Group { .. }));
    }

    #[test]
    fn scalars_use_string_conversion() {
        assert_eq!(
            render(&json!(85), 1),
            DisplayNode::Leaf {
                depth: 1,
                text: "85".to_string()
            }
        );
        assert_eq!(
            render(&json!(true), 0),
            DisplayNode::Leaf {
                depth: 0,
                text: "true".to_string()
            }
        );
    }

    #[test]
    fn object_entries_keep_insertion_order() {
        let value: Value =
            serde_json::from_str(r#"{"2_z": "a", "0_a": "b", "1_m": "c"}"#).unwrap();
        let DisplayNode::Group { children } = render(&value, 0) else {
            panic!("expected group");
        };
        let titles: Vec<&str> = children
            .iter()
            .map(|c| match c {
                DisplayNode::Titled { title, .. } => title.as_str(),
                _ => panic!("expected titled"),
            })
            .collect();
        assert_eq!(titles, vec!["Z", "A", "M"]);
    }

    #[test]
    fn depth_cap_truncates_instead_of_recursing() {
        let mut value = json!("bottom");
        for _ in 0..40 {
            value = json!({ "level": value });
        }
        let node = render(&value, 0);
        // terminates, and the truncated subtree is a single compact-JSON leaf
        assert!(node.leaf_count() >= 1);

        let mut cursor = &node;
        let leaf_depth = loop {
            match cursor {
                DisplayNode::Group { children } => cursor = &children[0],
                DisplayNode::Titled { body, .. } => cursor = body.as_ref(),
                DisplayNode::Leaf { depth, text } => {
                    assert!(text.contains("bottom"));
                    break *depth;
                }
            }
        };
        assert_eq!(leaf_depth, MAX_RENDER_DEPTH);
    }

    #[test]
    fn render_is_idempotent_on_same_input() {
        let value = json!({"0_a": {"title": "T", "details": ["d1", {"k": "v"}]}});
        assert_eq!(render(&value, 0), render(&value, 0));
    }

    #[test]
    fn humanize_strips_numeric_prefix_after_underscores() {
        assert_eq!(humanize_key("0_best_practices"), "Best practices");
        assert_eq!(humanize_key("irrigation_management"), "Irrigation management");
        // all-digit key has no trailing space, so nothing is stripped
        assert_eq!(humanize_key("2024"), "2024");
        assert_eq!(humanize_key(""), "");
    }

    #[test]
    fn advice_view_falls_back_to_plain_text() {
        assert_eq!(
            advice_view("just water it"),
            AdviceView::Plain {
                text: "just water it".to_string()
            }
        );
        // looks like JSON but is not valid: verbatim fallback
        assert_eq!(
            advice_view("{not json"),
            AdviceView::Plain {
                text: "{not json".to_string()
            }
        );
        assert!(matches!(
            advice_view(r#"{"a": "b"}"#),
            AdviceView::Structured { .. }
        ));
    }

    #[test]
    fn emphasis_marks_odd_segments() {
        let segments = emphasis_segments("Leaf **rust** detected");
        assert_eq!(
            segments,
            vec![(false, "Leaf "), (true, "rust"), (false, " detected")]
        );
        assert_eq!(emphasis_segments("plain"), vec![(false, "plain")]);
    }
}

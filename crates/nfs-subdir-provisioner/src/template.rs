// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Path pattern rendering against claim metadata.
//!
//! Patterns embed placeholders of the form `${.PVC.<key>}`,
//! `${.PVC.labels.<key>}` and `${.PVC.annotations.<key>}`. Plain keys are
//! `name`, `namespace` and `pvname`. Any lookup miss renders as the empty
//! string; a typo in a key silently yields an empty segment.

use std::collections::BTreeMap;

const PLACEHOLDER_OPEN: &str = "${.PVC.";
const PLACEHOLDER_CLOSE: char = '}';
const LABELS_PREFIX: &str = "labels.";
const ANNOTATIONS_PREFIX: &str = "annotations.";

/// Which metadata map a placeholder reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
	Field,
	Label,
	Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	Literal(String),
	Placeholder { kind: PlaceholderKind, key: String },
}

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
	segments: Vec<Segment>,
}

impl PathTemplate {
	/// Tokenize a pattern into literal and placeholder segments.
	///
	/// An opening `${.PVC.` without a closing brace is kept as literal text.
	pub fn parse(pattern: &str) -> Self {
		let mut segments = Vec::new();
		let mut literal = String::new();
		let mut rest = pattern;

		while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
			let body_start = start + PLACEHOLDER_OPEN.len();
			let Some(body_len) = rest[body_start..].find(PLACEHOLDER_CLOSE) else {
				break;
			};
			literal.push_str(&rest[..start]);
			if !literal.is_empty() {
				segments.push(Segment::Literal(std::mem::take(&mut literal)));
			}

			let body = &rest[body_start..body_start + body_len];
			segments.push(classify(body));
			rest = &rest[body_start + body_len + PLACEHOLDER_CLOSE.len_utf8()..];
		}

		literal.push_str(rest);
		if !literal.is_empty() {
			segments.push(Segment::Literal(literal));
		}

		Self { segments }
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	/// Substitute every placeholder in a single pass.
	pub fn render(&self, metadata: &ClaimMetadata<'_>) -> String {
		self
			.segments
			.iter()
			.map(|segment| match segment {
				Segment::Literal(text) => text.as_str(),
				Segment::Placeholder { kind, key } => metadata.lookup(*kind, key),
			})
			.collect()
	}
}

fn classify(body: &str) -> Segment {
	if let Some(key) = body.strip_prefix(LABELS_PREFIX) {
		Segment::Placeholder {
			kind: PlaceholderKind::Label,
			key: key.to_string(),
		}
	} else if let Some(key) = body.strip_prefix(ANNOTATIONS_PREFIX) {
		Segment::Placeholder {
			kind: PlaceholderKind::Annotation,
			key: key.to_string(),
		}
	} else {
		Segment::Placeholder {
			kind: PlaceholderKind::Field,
			key: body.to_string(),
		}
	}
}

/// Claim metadata visible to path patterns.
#[derive(Debug, Clone, Copy)]
pub struct ClaimMetadata<'a> {
	pub name: &'a str,
	pub namespace: &'a str,
	pub pv_name: &'a str,
	pub labels: Option<&'a BTreeMap<String, String>>,
	pub annotations: Option<&'a BTreeMap<String, String>>,
}

impl<'a> ClaimMetadata<'a> {
	fn lookup(&self, kind: PlaceholderKind, key: &str) -> &'a str {
		let found = match kind {
			PlaceholderKind::Field => match key {
				"name" => Some(self.name),
				"namespace" => Some(self.namespace),
				"pvname" => Some(self.pv_name),
				_ => None,
			},
			PlaceholderKind::Label => self.labels.and_then(|m| m.get(key)).map(String::as_str),
			PlaceholderKind::Annotation => self
				.annotations
				.and_then(|m| m.get(key))
				.map(String::as_str),
		};
		found.unwrap_or("")
	}
}

/// Parse and render a pattern in one call.
pub fn render_pattern(pattern: &str, metadata: &ClaimMetadata<'_>) -> String {
	PathTemplate::parse(pattern).render(metadata)
}

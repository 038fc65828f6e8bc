//! Turns extracted assignments into create-task payloads.

use chrono::NaiveDate;

use crate::activities::{self, Activity};
use crate::extractor::{ExtractedAssignment, NOT_FOUND};
use crate::notion_client::{
    DateProperty, DateRange, Link, Parent, RelationProperty, RelationRef, RichText,
    RichTextProperty, SelectProperty, StatusProperty, StatusValue, TaskProperties, TaskRecord,
    TextContent, TitleProperty,
};

/// Build the create-task payload for one extracted assignment.
///
/// The note aggregates every extracted field in a fixed label order; the due
/// date is omitted when absent or unparseable; the activity relation is
/// omitted entirely when no teacher matched.
pub fn build_task_record(
    assignment: &ExtractedAssignment,
    activities: &[Activity],
    database_id: &str,
    assumed_year: i32,
) -> TaskRecord {
    let due_date = parse_due_date(&assignment.due_date, assumed_year);

    let activity_id = activities::match_to_activity(&assignment.posted_by, activities);
    if activity_id.is_none() {
        tracing::info!(
            "No matching activity for assignment: {}",
            assignment.assignment_name
        );
    }

    let note = format!(
        "Assignment Link: {}\nClass Link: {}\nClass Name: {}\nPosted Date: {}\nPosted By: {}\nDescription: {}",
        assignment.assignment_link,
        assignment.class_link,
        assignment.class_name,
        assignment.posted_date,
        assignment.posted_by,
        assignment.assignment_description,
    );

    let title_link = if assignment.assignment_link != NOT_FOUND {
        Some(Link {
            url: assignment.assignment_link.clone(),
        })
    } else {
        None
    };

    TaskRecord {
        parent: Parent {
            database_id: database_id.to_string(),
        },
        properties: TaskProperties {
            status: StatusProperty {
                status: StatusValue {
                    name: "Not started".to_string(),
                },
            },
            task_type: SelectProperty { select: None },
            estimated_time: RichTextProperty { rich_text: vec![] },
            priority: SelectProperty { select: None },
            due_date: DateProperty { date: due_date },
            note: RichTextProperty {
                rich_text: vec![RichText {
                    text: TextContent {
                        content: note,
                        link: None,
                    },
                }],
            },
            name: TitleProperty {
                title: vec![RichText {
                    text: TextContent {
                        content: assignment.assignment_name.clone(),
                        link: title_link,
                    },
                }],
            },
            activity: activity_id.map(|id| RelationProperty {
                relation: vec![RelationRef { id }],
            }),
        },
    }
}

/// Parse "Jan 5"-style due text at the assumed year. Returns None (and logs)
/// when the text is the sentinel or does not parse. Dates falling on the
/// other side of a year rollover come out in the wrong year.
fn parse_due_date(text: &str, assumed_year: i32) -> Option<DateRange> {
    if text == NOT_FOUND {
        return None;
    }

    match NaiveDate::parse_from_str(&format!("{} {}", text.trim(), assumed_year), "%b %d %Y") {
        Ok(date) => {
            let start = date.and_hms_opt(0, 0, 0)?.format("%Y-%m-%dT%H:%M:%S").to_string();
            Some(DateRange { start, end: None })
        }
        Err(_) => {
            tracing::warn!("Unable to parse due date: {}", text);
            None
        }
    }
}

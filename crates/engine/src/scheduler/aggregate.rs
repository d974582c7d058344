// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregation of queued follow-up messages into one user turn.
//!
//! The output format is stable — the agent sees it verbatim, and tests
//! pin it byte for byte. Attachment numbers are allocated globally across
//! the batch in document order (a message's images before its documents).

use lo_core::{Attachment, SchedulerJob};

/// The single user turn produced from a batch of queued jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedMessage {
    pub text: String,
    pub images: Vec<Attachment>,
    pub documents: Vec<Attachment>,
}

const SINGLE_PREFIX: &str = "[Note: While you were working, the user added a follow-up message:]";
const ATTACHMENT_CLARIFICATION: &str =
    " Attachment references in each follow-up refer only to that follow-up's attachments.";

/// Combine queued jobs (already sorted by creation time) into one message.
pub fn aggregate_queued_messages(jobs: &[SchedulerJob]) -> AggregatedMessage {
    let images: Vec<Attachment> = jobs
        .iter()
        .flat_map(|j| j.message.images.iter().cloned())
        .collect();
    let documents: Vec<Attachment> = jobs
        .iter()
        .flat_map(|j| j.message.documents.iter().cloned())
        .collect();

    if let [only] = jobs {
        return AggregatedMessage {
            text: format!("{SINGLE_PREFIX}\n\n{}", only.message.content),
            images,
            documents,
        };
    }

    let batch_has_attachments = jobs.iter().any(|j| j.has_attachments());
    let carriers = jobs.iter().filter(|j| j.has_attachments()).count();
    let clarification = if carriers >= 2 {
        ATTACHMENT_CLARIFICATION
    } else {
        ""
    };
    let header = format!(
        "[Note: While you were working, the user added {} follow-up messages.{}]",
        jobs.len(),
        clarification
    );

    let mut next_attachment = 1usize;
    let blocks: Vec<String> = jobs
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let marker = format!("--- Follow-up message {} ---", i + 1);
            if !batch_has_attachments {
                return format!("{marker}\n{}", job.message.content);
            }
            let attachment_line = attachment_line(job, &mut next_attachment);
            format!("{marker}\n{attachment_line}\n\n{}", job.message.content)
        })
        .collect();

    AggregatedMessage {
        text: format!("{header}\n\n{}", blocks.join("\n\n")),
        images,
        documents,
    }
}

/// The per-block attachment line, consuming global attachment numbers for
/// this job's images then documents.
fn attachment_line(job: &SchedulerJob, next: &mut usize) -> String {
    if !job.has_attachments() {
        return "No attachments included.".to_string();
    }
    let refs: Vec<String> = job
        .message
        .images
        .iter()
        .chain(job.message.documents.iter())
        .map(|a| {
            let n = *next;
            *next += 1;
            format!("#{n} ({})", a.media_type)
        })
        .collect();
    format!("Attachments included: {}", refs.join(", "))
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;

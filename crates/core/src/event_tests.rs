// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::ProjectId;

#[test]
fn events_serialize_with_camel_case_tags() {
    let event = BusEvent::SessionChanged {
        project_id: ProjectId::new("-root-crate"),
        session_id: SessionId::new("s1"),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "sessionChanged");
    assert_eq!(json["projectId"], "-root-crate");
    assert_eq!(json["sessionId"], "s1");
}

#[test]
fn heartbeat_serializes_to_bare_tag() {
    let json = serde_json::to_value(BusEvent::Heartbeat {}).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "heartbeat" }));
}

#[test]
fn scheduler_jobs_changed_omits_missing_deleted_id() {
    let json = serde_json::to_value(BusEvent::SchedulerJobsChanged {
        deleted_job_id: None,
    })
    .unwrap();
    assert_eq!(json, serde_json::json!({ "type": "schedulerJobsChanged" }));

    let json = serde_json::to_value(BusEvent::SchedulerJobsChanged {
        deleted_job_id: Some(JobId::new("job-1")),
    })
    .unwrap();
    assert_eq!(json["deletedJobId"], "job-1");
}

#[yare::parameterized(
    session_list   = { "sessionListChanged", Channel::SessionListChanged },
    session        = { "sessionChanged", Channel::SessionChanged },
    agent_session  = { "agentSessionChanged", Channel::AgentSessionChanged },
    process        = { "sessionProcessChanged", Channel::SessionProcessChanged },
    jobs           = { "schedulerJobsChanged", Channel::SchedulerJobsChanged },
    permission     = { "permissionRequested", Channel::PermissionRequested },
    heartbeat      = { "heartbeat", Channel::Heartbeat },
)]
fn channel_names_parse(name: &str, expected: Channel) {
    assert_eq!(name.parse::<Channel>().unwrap(), expected);
    assert_eq!(expected.as_str(), name);
}

#[test]
fn unknown_channel_name_is_rejected() {
    assert!("nope".parse::<Channel>().is_err());
}

#[test]
fn channel_matches_serialized_tag() {
    let event = BusEvent::SessionListChanged {
        project_id: ProjectId::new("p"),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], event.channel().as_str());
}

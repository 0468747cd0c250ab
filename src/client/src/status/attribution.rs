use ghtail_common::constants::UNKNOWN_NAME;
use ghtail_common::types::{JobRecord, OutputEvent, RunIdentity, StepRecord};

/// Job and step a log batch was attributed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub job_name: String,
    pub step_name: String,
    pub step_number: i64,
    pub assumed_step_name: bool,
}

impl Attribution {
    pub fn unknown() -> Self {
        Self {
            job_name: UNKNOWN_NAME.to_string(),
            step_name: UNKNOWN_NAME.to_string(),
            step_number: 0,
            assumed_step_name: true,
        }
    }

    pub fn into_event(self, run: RunIdentity, lines: Vec<String>) -> OutputEvent {
        OutputEvent {
            run,
            job_name: self.job_name,
            step_name: self.step_name,
            step_number: self.step_number,
            assumed_step_name: self.assumed_step_name,
            lines,
        }
    }
}

/// Names the step that produced a batch of `job`.
///
/// An exact match on the step number wins. Otherwise the in-progress step
/// with the greatest number is assumed. This misattributes lines when a job
/// runs steps in parallel.
pub fn attribute(job: Option<&JobRecord>, step_number: Option<i64>) -> Attribution {
    let Some(job) = job else {
        return Attribution::unknown();
    };

    let exact = step_number.and_then(|number| job.steps.iter().find(|step| step.number == number));
    let (step, assumed) = match exact {
        Some(step) => (Some(step), false),
        None => (latest_in_progress(&job.steps), true),
    };

    Attribution {
        job_name: job.name.clone(),
        step_name: step
            .map(|step| step.name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        step_number: step.map(|step| step.number).unwrap_or_default(),
        assumed_step_name: assumed,
    }
}

fn latest_in_progress(steps: &[StepRecord]) -> Option<&StepRecord> {
    steps
        .iter()
        .filter(|step| step.is_in_progress())
        .max_by_key(|step| step.number)
}

//! Self-assessment survey: a fixed, linear sequence of rating prompts whose
//! answers are saved as one batch on the final step.
//!
//! ```text
//! Idle -> InProgress(0) -> ... -> InProgress(n-1) -> Saving -> Completed
//!                                                      |
//!                                                      v
//!                                                    Error (answers kept, advance retries)
//! ```
//! `close` returns to `Idle` from anywhere and drops unsaved answers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SurveyConfig;
use crate::error::{GrowthError, Result};
use crate::models::{Answer, SelfRating};
use crate::persist;
use crate::resolver::{self, CuratedFocusArea};
use crate::scale::{self, GradeScale, RatingOption};
use crate::store::GrowthStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyState {
    Idle,
    InProgress { step: usize },
    Saving,
    Completed,
    /// A failed save or an unusable rating; captured answers are kept.
    Error { step: usize, message: String },
}

/// Everything needed to render the current step.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub step: usize,
    pub total: usize,
    pub focus_area_id: Uuid,
    pub focus_area_name: String,
    pub text: String,
    pub options: Vec<RatingOption>,
    pub selected: Option<i32>,
}

pub struct Survey {
    student_id: Uuid,
    items: Vec<CuratedFocusArea>,
    scale: GradeScale,
    state: SurveyState,
    answers: HashMap<Uuid, i32>,
    last_completed: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Survey {
    pub fn new(
        student_id: Uuid,
        items: Vec<CuratedFocusArea>,
        scale: GradeScale,
        last_completed: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            student_id,
            items,
            scale,
            state: SurveyState::Idle,
            answers: HashMap::new(),
            last_completed,
            last_error: None,
        }
    }

    /// Builds an idle survey for the learner from the catalog and the curated config.
    pub async fn load(
        store: &dyn GrowthStore,
        student_id: Uuid,
        config: &SurveyConfig,
    ) -> Result<Self> {
        let catalog = store
            .focus_areas()
            .await
            .map_err(GrowthError::fetch("focus areas"))?;
        let items = resolver::curated_focus_areas(&catalog, config);
        let scale = GradeScale::load(store).await?;
        let last_completed = store
            .last_self_assessment_at(student_id)
            .await
            .map_err(GrowthError::fetch("last self-assessment"))?;
        debug!(%student_id, steps = items.len(), "survey loaded");
        Ok(Self::new(student_id, items, scale, last_completed))
    }

    pub fn state(&self) -> &SurveyState {
        &self.state
    }

    pub fn steps(&self) -> usize {
        self.items.len()
    }

    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        self.last_completed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state == SurveyState::Saving {
            return Err(GrowthError::Validation(
                "cannot restart while answers are being saved".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(GrowthError::Validation(
                "no focus areas to assess".to_string(),
            ));
        }
        self.answers.clear();
        self.last_error = None;
        self.state = SurveyState::InProgress { step: 0 };
        debug!(student_id = %self.student_id, "survey started");
        Ok(())
    }

    /// Starts a run pre-filled with prior ratings for the surveyed areas.
    pub fn start_prefilled(&mut self, prior: &[SelfRating]) -> Result<()> {
        self.start()?;
        for rating in prior {
            let surveyed = self
                .items
                .iter()
                .any(|item| item.focus_area.id == rating.focus_area_id);
            if surveyed && scale::is_valid(rating.value) {
                self.answers.insert(rating.focus_area_id, rating.value);
            }
        }
        Ok(())
    }

    fn current_step(&self) -> Option<usize> {
        match self.state {
            SurveyState::InProgress { step } | SurveyState::Error { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Records a rating for `step` (the current step or an earlier one).
    pub fn select_rating(&mut self, step: usize, value: i32) -> Result<()> {
        let current = self.current_step().ok_or_else(|| {
            GrowthError::Validation("no survey in progress".to_string())
        })?;
        if step > current || step >= self.items.len() {
            return Err(GrowthError::Validation(format!(
                "step {step} is not reachable from step {current}"
            )));
        }
        if !scale::is_valid(value) {
            return Err(GrowthError::Validation(format!(
                "rating {value} is not on the scale"
            )));
        }
        self.answers.insert(self.items[step].focus_area.id, value);
        Ok(())
    }

    pub fn current_prompt(&self) -> Option<Prompt> {
        let step = self.current_step()?;
        let item = self.items.get(step)?;
        Some(Prompt {
            step,
            total: self.items.len(),
            focus_area_id: item.focus_area.id,
            focus_area_name: item.focus_area.name.clone(),
            text: item.prompt.clone(),
            options: scale::options(),
            selected: self.answers.get(&item.focus_area.id).copied(),
        })
    }

    fn collect_answers(&self) -> Result<Vec<Answer>> {
        let complete = self.answers.len() == self.items.len()
            && self
                .items
                .iter()
                .all(|item| self.answers.contains_key(&item.focus_area.id));
        if !complete {
            return Err(GrowthError::Validation(format!(
                "expected {} answers, found {}",
                self.items.len(),
                self.answers.len()
            )));
        }

        self.items
            .iter()
            .map(|item| -> Result<Answer> {
                let value = self.answers[&item.focus_area.id];
                let grade_id = self.scale.grade_id(value).ok_or_else(|| {
                    GrowthError::Validation(format!("no grade row for rating {value}"))
                })?;
                Ok(Answer {
                    focus_area_id: item.focus_area.id,
                    grade_id,
                })
            })
            .collect()
    }

    /// Moves to the next step, or saves every answer from the final step.
    pub async fn advance(&mut self, store: &dyn GrowthStore) -> Result<&SurveyState> {
        let step = self.current_step().ok_or_else(|| {
            GrowthError::Validation("no survey in progress".to_string())
        })?;
        let item = &self.items[step];
        if !self.answers.contains_key(&item.focus_area.id) {
            return Err(GrowthError::Validation(format!(
                "no rating recorded for {}",
                item.focus_area.name
            )));
        }

        if step + 1 < self.items.len() {
            self.state = SurveyState::InProgress { step: step + 1 };
            return Ok(&self.state);
        }

        let answers = match self.collect_answers() {
            Ok(answers) => answers,
            Err(err) => {
                self.fail(step, &err);
                return Err(err);
            }
        };

        self.state = SurveyState::Saving;
        match persist::save_responses(store, self.student_id, &answers).await {
            Ok(_) => {
                self.state = SurveyState::Completed;
                self.last_completed = Some(Utc::now());
                self.last_error = None;
                info!(student_id = %self.student_id, answers = answers.len(), "survey completed");
                Ok(&self.state)
            }
            Err(err) => {
                self.fail(step, &err);
                Err(err)
            }
        }
    }

    fn fail(&mut self, step: usize, err: &GrowthError) {
        let message = err.to_string();
        warn!(student_id = %self.student_id, step, error = %message, "survey step failed");
        self.last_error = Some(message.clone());
        self.state = SurveyState::Error { step, message };
    }

    pub fn close(&mut self) {
        self.answers.clear();
        self.last_error = None;
        self.state = SurveyState::Idle;
    }
}

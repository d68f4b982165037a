//! # Conversation Engine
//!
//! Generic step-sequenced state machine behind every multi-message
//! workflow. A workflow is a static table of [`StepDef`]s plus a handful of
//! hooks ([`Workflow`]); the [`Engine`] owns sequencing, validation,
//! back/cancel navigation, the keep-existing shortcut for edits and the
//! final commit.
//!
//! The engine never talks to Telegram: each call returns a [`Turn`] holding
//! the transport-neutral [`Reply`] list and either the updated [`Session`]
//! or [`Flow::Finished`].

use std::fmt::Debug;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::errors::ShopError;
use crate::model::{MediaRef, OrderSnapshot};
use crate::navigation::Descriptor;
use crate::store::ShopStore;
use crate::texts::t;

/// Input that copies the edit target's value instead of parsing new input
pub const KEEP_EXISTING_TOKEN: &str = ".";

/// Workflow control inputs, typed or pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlToken {
    Confirm,
    Cancel,
    Back,
}

impl ControlToken {
    /// Case-insensitive match of a control word (Russian or English)
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "confirm" | "подтвердить" => Some(ControlToken::Confirm),
            "cancel" | "отмена" => Some(ControlToken::Cancel),
            "back" | "назад" => Some(ControlToken::Back),
            _ => None,
        }
    }

    /// Callback data of the inline button carrying this token
    pub fn as_callback(self) -> &'static str {
        match self {
            ControlToken::Confirm => "confirm",
            ControlToken::Cancel => "cancel",
            ControlToken::Back => "back",
        }
    }
}

/// One inbound event, as seen by a workflow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Media(MediaRef),
    /// Id picked from an inline choice keyboard
    Choice(String),
    Control(ControlToken),
}

/// How a step reads its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any non-empty text
    Text,
    /// Non-negative decimal number
    Decimal,
    /// Id from a dynamically fetched choice set
    Choice,
    /// Media attachment
    Media,
    /// Computed by the workflow, never typed by the user
    Derived,
    /// Confirm button press
    Confirmation,
}

/// Static description of one workflow step
#[derive(Debug, Clone, Copy)]
pub struct StepDef<S: 'static> {
    pub step: S,
    pub field: &'static str,
    pub kind: FieldKind,
    /// Text key of the first prompt
    pub prompt: &'static str,
    /// Text key sent after invalid input
    pub retry: &'static str,
    /// Text key sent when navigating back into the step
    pub back_prompt: &'static str,
}

/// Validated step value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Decimal(Decimal),
    Choice(i32),
    Media(MediaRef),
    Snapshot(OrderSnapshot),
    Confirmed,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<i32> {
        match self {
            FieldValue::Choice(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaRef> {
        match self {
            FieldValue::Media(media) => Some(media),
            _ => None,
        }
    }

    pub fn as_snapshot(&self) -> Option<&OrderSnapshot> {
        match self {
            FieldValue::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Rejected step input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalid;

pub fn validate_text(input: &Input) -> Result<FieldValue, Invalid> {
    match input {
        Input::Text(text) if !text.trim().is_empty() => Ok(FieldValue::Text(text.trim().to_string())),
        _ => Err(Invalid),
    }
}

/// Fractional digits a decimal step keeps; matches the `NUMERIC(10,2)` price column
pub const DECIMAL_SCALE: u32 = 2;

/// Largest value a decimal step accepts
pub const MAX_DECIMAL: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2); // 99_999_999.99

/// Non-negative decimal of at most [`DECIMAL_SCALE`] fractional digits, up to
/// [`MAX_DECIMAL`]; a comma is accepted as the decimal separator
pub fn validate_decimal(input: &Input) -> Result<FieldValue, Invalid> {
    let Input::Text(text) = input else {
        return Err(Invalid);
    };
    let normalized = text.trim().replace(',', ".");
    let value = Decimal::from_str(&normalized).map_err(|_| Invalid)?.normalize();
    if value.is_sign_negative() || value.scale() > DECIMAL_SCALE || value > MAX_DECIMAL {
        return Err(Invalid);
    }
    Ok(FieldValue::Decimal(value))
}

pub fn validate_media(input: &Input) -> Result<FieldValue, Invalid> {
    match input {
        Input::Media(media) => Ok(FieldValue::Media(media.clone())),
        _ => Err(Invalid),
    }
}

/// The picked id must belong to `choices`
pub fn validate_choice(input: &Input, choices: &[Choice]) -> Result<FieldValue, Invalid> {
    let Input::Choice(raw) = input else {
        return Err(Invalid);
    };
    let id = raw.trim().parse::<i32>().map_err(|_| Invalid)?;
    if choices.iter().any(|choice| choice.id == id) {
        Ok(FieldValue::Choice(id))
    } else {
        Err(Invalid)
    }
}

pub fn validate_confirmation(input: &Input) -> Result<FieldValue, Invalid> {
    match input {
        Input::Control(ControlToken::Confirm) => Ok(FieldValue::Confirmed),
        _ => Err(Invalid),
    }
}

/// Selectable option of a choice step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: i32,
    pub label: String,
}

/// Reply keyboard to attach to a text reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKeyboard {
    Unchanged,
    /// Back / cancel
    Workflow,
    /// Admin panel actions
    Admin,
    Remove,
}

/// Transport-neutral outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text { text: String, keyboard: ReplyKeyboard },
    /// Text with one inline button per choice
    Choices { text: String, choices: Vec<Choice> },
    /// Text with confirm / cancel inline buttons
    Confirm { text: String },
    Photo { media: MediaRef, caption: String },
    /// Pacing delay between two sequential messages
    Pause(Duration),
    /// Render a menu screen
    Menu(Descriptor),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            keyboard: ReplyKeyboard::Unchanged,
        }
    }

    pub fn text_with(text: impl Into<String>, keyboard: ReplyKeyboard) -> Self {
        Reply::Text {
            text: text.into(),
            keyboard,
        }
    }

    /// Text content, if the reply has any
    pub fn body(&self) -> Option<&str> {
        match self {
            Reply::Text { text, .. } | Reply::Choices { text, .. } | Reply::Confirm { text } => Some(text),
            Reply::Photo { caption, .. } => Some(caption),
            Reply::Pause(_) | Reply::Menu(_) => None,
        }
    }
}

/// Per-user conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session<S, T> {
    pub user_id: i64,
    pub current_step: S,
    /// Validated values in step order
    pub collected_fields: Vec<(S, FieldValue)>,
    /// Entity being edited; `None` when creating
    pub edit_target: Option<T>,
    /// Consecutive invalid inputs at the current step
    pub invalid_inputs: u32,
    pub updated_at: DateTime<Utc>,
}

impl<S: Copy + PartialEq, T> Session<S, T> {
    pub fn new(user_id: i64, first_step: S, edit_target: Option<T>) -> Self {
        Self {
            user_id,
            current_step: first_step,
            collected_fields: Vec::new(),
            edit_target,
            invalid_inputs: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn field(&self, step: S) -> Option<&FieldValue> {
        self.collected_fields
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, value)| value)
    }

    pub fn is_editing(&self) -> bool {
        self.edit_target.is_some()
    }

    /// Idle for longer than `ttl`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| {
            now.signed_duration_since(self.updated_at)
                .to_std()
                .is_ok_and(|idle| idle > ttl)
        })
    }

    fn record(&mut self, step: S, value: FieldValue) {
        match self.collected_fields.iter_mut().find(|(s, _)| *s == step) {
            Some(entry) => entry.1 = value,
            None => self.collected_fields.push((step, value)),
        }
    }
}

/// Whether the conversation continues after a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<S, T> {
    Continue(Session<S, T>),
    Finished,
}

/// Outcome of feeding one input to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Turn<S, T> {
    pub flow: Flow<S, T>,
    pub replies: Vec<Reply>,
}

impl<S, T> Turn<S, T> {
    fn continuing(session: Session<S, T>, replies: Vec<Reply>) -> Self {
        Self {
            flow: Flow::Continue(session),
            replies,
        }
    }

    fn finished(replies: Vec<Reply>) -> Self {
        Self {
            flow: Flow::Finished,
            replies,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.flow, Flow::Finished)
    }

    pub fn session(&self) -> Option<&Session<S, T>> {
        match &self.flow {
            Flow::Continue(session) => Some(session),
            Flow::Finished => None,
        }
    }
}

/// Result of computing a derived step
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    Value { value: FieldValue, replies: Vec<Reply> },
    /// End the conversation without committing
    Abort { replies: Vec<Reply> },
}

/// Why a conversation ended without a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Cancelled,
    CommitFailed,
    TooManyInvalidInputs,
}

/// Concrete workflow: a step table plus hooks
#[async_trait]
pub trait Workflow: Send + Sync {
    type Step: Copy + Eq + Debug + Send + Sync + 'static;
    type Target: Clone + Debug + Send + Sync;

    fn name(&self) -> &'static str;

    /// Ordered step table; the last step's success commits
    fn steps(&self) -> &'static [StepDef<Self::Step>];

    /// Value carried over from the edit target for `step`
    fn keep_existing(&self, _target: &Self::Target, _step: Self::Step) -> Option<FieldValue> {
        None
    }

    /// Live choice set of a [`FieldKind::Choice`] step
    async fn choices(&self, _store: &dyn ShopStore, _step: Self::Step) -> Result<Vec<Choice>, ShopError> {
        Ok(Vec::new())
    }

    /// Compute a [`FieldKind::Derived`] step
    async fn derive(
        &self,
        _store: &dyn ShopStore,
        session: &Session<Self::Step, Self::Target>,
    ) -> Result<Derivation, ShopError> {
        Err(ShopError::Configuration(format!(
            "{} has no derived value for {:?}",
            self.name(),
            session.current_step
        )))
    }

    /// Persist the collected aggregate
    async fn commit(
        &self,
        store: &dyn ShopStore,
        session: &Session<Self::Step, Self::Target>,
    ) -> Result<Vec<Reply>, ShopError>;

    fn exit_replies(&self, reason: ExitReason) -> Vec<Reply>;
}

/// Drives one workflow against a store
pub struct Engine<'a, W: Workflow> {
    workflow: &'a W,
    store: &'a dyn ShopStore,
    max_invalid_inputs: u32,
}

type WorkflowSession<W> = Session<<W as Workflow>::Step, <W as Workflow>::Target>;
type WorkflowTurn<W> = Turn<<W as Workflow>::Step, <W as Workflow>::Target>;

impl<'a, W: Workflow> Engine<'a, W> {
    /// `max_invalid_inputs == 0` tolerates any number of invalid inputs
    pub fn new(workflow: &'a W, store: &'a dyn ShopStore, max_invalid_inputs: u32) -> Self {
        Self {
            workflow,
            store,
            max_invalid_inputs,
        }
    }

    /// Open a session at the first step
    pub async fn start(&self, user_id: i64, edit_target: Option<W::Target>) -> Result<WorkflowTurn<W>, ShopError> {
        let first = self
            .workflow
            .steps()
            .first()
            .ok_or_else(|| ShopError::Configuration(format!("{} has no steps", self.workflow.name())))?;

        info!(
            workflow = self.workflow.name(),
            user_id,
            editing = edit_target.is_some(),
            "Workflow started"
        );
        let session = Session::new(user_id, first.step, edit_target);
        self.enter(session, 0, Vec::new()).await
    }

    /// Feed one input to the current step
    pub async fn handle(&self, mut session: WorkflowSession<W>, input: Input) -> Result<WorkflowTurn<W>, ShopError> {
        session.updated_at = Utc::now();
        debug!(
            workflow = self.workflow.name(),
            user_id = session.user_id,
            step = ?session.current_step,
            input = ?input,
            "Workflow input"
        );

        match input {
            Input::Control(ControlToken::Cancel) => {
                info!(
                    workflow = self.workflow.name(),
                    user_id = session.user_id,
                    step = ?session.current_step,
                    "Workflow cancelled"
                );
                Ok(Turn::finished(self.workflow.exit_replies(ExitReason::Cancelled)))
            }
            Input::Control(ControlToken::Back) => self.back(session).await,
            input => self.accept(session, input).await,
        }
    }

    fn index_of(&self, step: W::Step) -> Result<usize, ShopError> {
        self.workflow
            .steps()
            .iter()
            .position(|def| def.step == step)
            .ok_or_else(|| {
                ShopError::Configuration(format!("{:?} is not a step of {}", step, self.workflow.name()))
            })
    }

    async fn accept(&self, mut session: WorkflowSession<W>, input: Input) -> Result<WorkflowTurn<W>, ShopError> {
        let index = self.index_of(session.current_step)?;
        let def = &self.workflow.steps()[index];

        let kept = match (&input, &session.edit_target) {
            (Input::Text(text), Some(target)) if text.trim() == KEEP_EXISTING_TOKEN => {
                self.workflow.keep_existing(target, def.step)
            }
            _ => None,
        };

        let parsed = match kept {
            Some(value) => Ok(value),
            None => self.validate(def, &input).await?,
        };

        match parsed {
            Ok(value) => {
                session.record(def.step, value);
                session.invalid_inputs = 0;
                self.enter(session, index + 1, Vec::new()).await
            }
            Err(Invalid) => self.reject(session, def).await,
        }
    }

    async fn validate(&self, def: &StepDef<W::Step>, input: &Input) -> Result<Result<FieldValue, Invalid>, ShopError> {
        Ok(match def.kind {
            FieldKind::Text => validate_text(input),
            FieldKind::Decimal => validate_decimal(input),
            FieldKind::Media => validate_media(input),
            FieldKind::Confirmation => validate_confirmation(input),
            FieldKind::Choice => {
                let choices = self.workflow.choices(self.store, def.step).await?;
                validate_choice(input, &choices)
            }
            FieldKind::Derived => Err(Invalid),
        })
    }

    async fn reject(&self, mut session: WorkflowSession<W>, def: &StepDef<W::Step>) -> Result<WorkflowTurn<W>, ShopError> {
        session.invalid_inputs += 1;
        if self.max_invalid_inputs > 0 && session.invalid_inputs >= self.max_invalid_inputs {
            warn!(
                workflow = self.workflow.name(),
                user_id = session.user_id,
                step = ?def.step,
                attempts = session.invalid_inputs,
                "Too many invalid inputs, dropping workflow"
            );
            return Ok(Turn::finished(
                self.workflow.exit_replies(ExitReason::TooManyInvalidInputs),
            ));
        }

        let reply = self.prompt(&session, def, def.retry).await?;
        Ok(Turn::continuing(session, vec![reply]))
    }

    async fn back(&self, mut session: WorkflowSession<W>) -> Result<WorkflowTurn<W>, ShopError> {
        let steps = self.workflow.steps();
        let index = self.index_of(session.current_step)?;

        let Some(previous) = steps[..index]
            .iter()
            .rposition(|def| def.kind != FieldKind::Derived)
        else {
            let prompt = self.prompt(&session, &steps[index], steps[index].prompt).await?;
            return Ok(Turn::continuing(
                session,
                vec![Reply::text(t("back-unavailable")), prompt],
            ));
        };

        let kept_steps: Vec<W::Step> = steps[..previous].iter().map(|def| def.step).collect();
        session.collected_fields.retain(|(step, _)| kept_steps.contains(step));
        session.current_step = steps[previous].step;
        session.invalid_inputs = 0;

        let reply = self
            .prompt(&session, &steps[previous], steps[previous].back_prompt)
            .await?;
        Ok(Turn::continuing(session, vec![reply]))
    }

    /// Move to step `index`, computing derived steps on the way; past the
    /// last step the aggregate is committed
    async fn enter(
        &self,
        mut session: WorkflowSession<W>,
        mut index: usize,
        mut replies: Vec<Reply>,
    ) -> Result<WorkflowTurn<W>, ShopError> {
        let steps = self.workflow.steps();
        loop {
            let Some(def) = steps.get(index) else {
                return Ok(self.commit(session, replies).await);
            };
            session.current_step = def.step;

            if def.kind != FieldKind::Derived {
                replies.push(self.prompt(&session, def, def.prompt).await?);
                return Ok(Turn::continuing(session, replies));
            }

            match self.workflow.derive(self.store, &session).await? {
                Derivation::Value { value, replies: derived } => {
                    replies.extend(derived);
                    session.record(def.step, value);
                    index += 1;
                }
                Derivation::Abort { replies: derived } => {
                    info!(
                        workflow = self.workflow.name(),
                        user_id = session.user_id,
                        step = ?def.step,
                        "Workflow aborted while deriving"
                    );
                    replies.extend(derived);
                    return Ok(Turn::finished(replies));
                }
            }
        }
    }

    async fn prompt(&self, session: &WorkflowSession<W>, def: &StepDef<W::Step>, key: &str) -> Result<Reply, ShopError> {
        let mut text = t(key);
        let can_keep = session
            .edit_target
            .as_ref()
            .is_some_and(|target| self.workflow.keep_existing(target, def.step).is_some());
        if can_keep {
            text.push('\n');
            text.push_str(&t("keep-existing-hint"));
        }

        Ok(match def.kind {
            FieldKind::Choice => Reply::Choices {
                text,
                choices: self.workflow.choices(self.store, def.step).await?,
            },
            FieldKind::Confirmation => Reply::Confirm { text },
            _ => Reply::text_with(text, ReplyKeyboard::Workflow),
        })
    }

    async fn commit(&self, session: WorkflowSession<W>, mut replies: Vec<Reply>) -> WorkflowTurn<W> {
        match self.workflow.commit(self.store, &session).await {
            Ok(committed) => {
                info!(
                    workflow = self.workflow.name(),
                    user_id = session.user_id,
                    editing = session.is_editing(),
                    "Workflow committed"
                );
                replies.extend(committed);
            }
            Err(e) => {
                error!(
                    workflow = self.workflow.name(),
                    user_id = session.user_id,
                    error = %e,
                    "Workflow commit failed"
                );
                replies.extend(self.workflow.exit_replies(ExitReason::CommitFailed));
            }
        }
        Turn::finished(replies)
    }
}

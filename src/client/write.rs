//! Post writing screen.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::client::usecase::WriteUseCase;
use crate::client::view_model::{Context, Failure, FailureKind, ViewModel};
use crate::dto::Dto;
use crate::model::{PostDraft, WriteResponse};

const MAX_IMAGES: usize = 10;
const OPERATION: &str = "write";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    UpdateTitle(String),
    UpdateDescription(String),
    SelectPlace(String),
    IsVisibilityButtonTouched,
    AddImageData(Vec<u8>),
    WriteSubmit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    IsVisibilityToggle(bool),
    OutputImageData(Vec<Vec<u8>>),
    UploadWrite(WriteResponse),
    Failed(Failure),
}

pub struct WriteViewModel {
    writer: Arc<dyn WriteUseCase>,
    title: String,
    description: Option<String>,
    place_id: Option<String>,
    is_visible: bool,
    images: Vec<Vec<u8>>,
    /// Last draft sent, cleared from the form once written unless edited since.
    submitted: Option<PostDraft>,
}

impl WriteViewModel {
    pub fn new(writer: Arc<dyn WriteUseCase>) -> Self {
        Self {
            writer,
            title: String::new(),
            description: None,
            place_id: None,
            is_visible: true,
            images: Vec::new(),
            submitted: None,
        }
    }

    fn draft(&self) -> PostDraft {
        PostDraft {
            title: self.title.trim().to_owned(),
            description: self.description.clone(),
            place_id: self.place_id.clone(),
            is_visible: self.is_visible,
            images: self.images.iter().map(|image| STANDARD.encode(image)).collect(),
        }
    }

    fn toggle_visibility(&mut self, ctx: &mut Context<Self>) {
        self.is_visible = !self.is_visible;
        ctx.emit(Output::IsVisibilityToggle(self.is_visible));
    }

    fn add_image(&mut self, image: Vec<u8>, ctx: &mut Context<Self>) {
        if self.images.len() >= MAX_IMAGES {
            ctx.emit(Output::Failed(Failure::new("add_image", FailureKind::Validation)));
            return;
        }
        self.images.push(image);
        ctx.emit(Output::OutputImageData(self.images.clone()));
    }

    /// Send the draft, once it passes the same rules the server applies.
    fn submit(&mut self, ctx: &mut Context<Self>) {
        let draft = self.draft();

        if let Err(errors) = draft.inspect() {
            let fields: Vec<_> = errors.field_errors().into_keys().collect();
            tracing::debug!(?fields, "draft rejected");
            ctx.emit(Output::Failed(Failure::new(OPERATION, FailureKind::Validation)));
            return;
        }

        self.submitted = Some(draft.clone());
        let writer = Arc::clone(&self.writer);
        ctx.spawn(OPERATION, async move { writer.write(draft).await });
    }
}

impl ViewModel for WriteViewModel {
    type Input = Input;
    type Output = Output;
    type Completion = WriteResponse;

    fn handle(&mut self, input: Input, ctx: &mut Context<Self>) {
        match input {
            Input::UpdateTitle(title) => self.title = title,
            Input::UpdateDescription(description) => {
                self.description = Some(description).filter(|d| !d.is_empty())
            },
            Input::SelectPlace(place_id) => self.place_id = Some(place_id),
            Input::IsVisibilityButtonTouched => self.toggle_visibility(ctx),
            Input::AddImageData(image) => self.add_image(image, ctx),
            Input::WriteSubmit => self.submit(ctx),
        }
    }

    /// A written post clears the form, unless it was edited while in flight.
    fn apply(&mut self, written: WriteResponse) -> Output {
        if self.submitted.take().is_some_and(|sent| sent == self.draft()) {
            self.title.clear();
            self.description = None;
            self.place_id = None;
            self.is_visible = true;
            self.images.clear();
        }
        Output::UploadWrite(written)
    }

    fn failed(failure: Failure) -> Output {
        Output::Failed(failure)
    }
}

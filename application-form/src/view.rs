use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTone {
    Success,
    Failure,
}

/// The page the form lives on. The client drives it; implementations decide how each effect is
/// rendered.
pub trait FormView {
    /// Shows or hides the spinner and disables or re-enables the submit control.
    fn set_busy(&mut self, busy: bool);

    /// A blocking notice, used when validation stops the submission.
    fn alert(&mut self, message: &str);

    fn mark_field(&mut self, name: &str, valid: bool);

    /// The inline message below the form.
    fn show_message(&mut self, message: &str, tone: MessageTone);

    fn redirect_after(&mut self, delay: Duration, location: &str);
}

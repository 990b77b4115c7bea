/// Evaluation context of a single event.
pub struct Context<'a, E> {
    event: &'a E,
}

impl<'a, E> Context<'a, E> {
    pub fn new(event: &'a E) -> Self {
        Self { event }
    }

    pub fn event(&self) -> &'a E {
        self.event
    }
}

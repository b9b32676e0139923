//! Typed operation chains.
//!
//! A chain is composed at build time: `then` only accepts a step whose
//! input type equals the previous step's output type, so a mismatched
//! chain is a compile error, not a runtime cast. Seed-valued links flow as
//! lazy streams; a step that needs the whole seed set (range construction
//! does) collects it, and the first error in a collected stream aborts
//! the chain there.

use crate::{
    element::Seed,
    error::Error,
    ops::{
        AddElements, GetAdjacentEntitySeeds, GetAllElements, GetElements, SeedStream, handler,
    },
    retrieve::ElementStream,
    store::Store,
    write::{self, WriteSummary},
};

///
/// ChainStep
///

pub trait ChainStep {
    type Input;
    type Output;

    fn run(self, store: &Store, input: Self::Input) -> Result<Self::Output, Error>;
}

impl ChainStep for GetElements {
    type Input = SeedStream;
    type Output = ElementStream;

    fn run(self, store: &Store, input: Self::Input) -> Result<Self::Output, Error> {
        let extra = collect_seeds(input)?;
        handler::get_elements(store, self, extra)
    }
}

impl ChainStep for GetAllElements {
    type Input = ();
    type Output = ElementStream;

    fn run(self, store: &Store, (): Self::Input) -> Result<Self::Output, Error> {
        handler::get_all_elements(store, self)
    }
}

impl ChainStep for GetAdjacentEntitySeeds {
    type Input = SeedStream;
    type Output = SeedStream;

    fn run(self, store: &Store, input: Self::Input) -> Result<Self::Output, Error> {
        let extra = collect_seeds(input)?;
        handler::get_adjacent_entity_seeds(store, self, extra)
    }
}

impl ChainStep for AddElements {
    type Input = ElementStream;
    type Output = WriteSummary;

    fn run(self, store: &Store, input: Self::Input) -> Result<Self::Output, Error> {
        let inline = self.elements.into_iter().map(Ok);
        write::add_elements(store, inline.chain(input))
    }
}

fn collect_seeds(stream: SeedStream) -> Result<Vec<Seed>, Error> {
    stream.collect()
}

/// An empty seed stream, for starting a chain at a seed-consuming step.
#[must_use]
pub fn no_seeds() -> SeedStream {
    Box::new(std::iter::empty())
}

///
/// OperationChain
///

pub struct OperationChain<I, O> {
    run: Box<dyn FnOnce(&Store, I) -> Result<O, Error>>,
}

impl<I: 'static, O: 'static> OperationChain<I, O> {
    pub fn start<S>(step: S) -> OperationChain<S::Input, S::Output>
    where
        S: ChainStep<Input = I, Output = O> + 'static,
    {
        OperationChain {
            run: Box::new(move |store, input| step.run(store, input)),
        }
    }

    /// Append a step consuming this chain's output.
    #[must_use]
    pub fn then<S>(self, step: S) -> OperationChain<I, S::Output>
    where
        S: ChainStep<Input = O> + 'static,
    {
        let prior = self.run;
        OperationChain {
            run: Box::new(move |store, input| {
                let intermediate = prior(store, input)?;
                step.run(store, intermediate)
            }),
        }
    }

    pub fn execute(self, store: &Store, input: I) -> Result<O, Error> {
        (self.run)(store, input)
    }
}

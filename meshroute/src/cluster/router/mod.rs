pub mod mesh;
pub mod utils;

use std::{fmt::Debug, sync::Arc};

use meshroute_base::Url;

use crate::invocation::RpcInvocation;

/// Narrows a candidate invoker list for one invocation. Implementations must
/// never fail a call outright: a router that cannot apply its policy returns
/// the candidates it was given.
pub trait Router: Debug {
    fn route(&self, invokers: Vec<Url>, url: Url, invocation: Arc<RpcInvocation>) -> Vec<Url>;
}

pub type BoxRouter = Box<dyn Router + Sync + Send>;

#[derive(Debug, Default, Clone)]
pub struct MockRouter {}

impl Router for MockRouter {
    fn route(&self, invokers: Vec<Url>, _url: Url, _invocation: Arc<RpcInvocation>) -> Vec<Url> {
        invokers
    }
}

use std::fmt::Debug;

use almanac_infra::AlmanacContext;
use tracing::debug;

#[async_trait::async_trait]
pub trait UseCase: Debug + Send {
    type Response: Debug + Send;
    type Error: Send;

    /// UseCase name identifier
    const NAME: &'static str;

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error>;
}

#[tracing::instrument(name = "UseCase executed", skip(usecase, ctx), fields(usecase = %U::NAME))]
pub async fn execute<U>(mut usecase: U, ctx: &AlmanacContext) -> Result<U::Response, U::Error>
where
    U: UseCase + Send,
    U::Error: Debug + Send,
{
    debug!("{:?}", usecase);
    let res = usecase.execute(ctx).await;

    if let Err(e) = &res {
        // This is debug because the error is usually already logged deeper
        // in the stack
        debug!("Error: {:?}", e);
    }

    res
}

//! STS caller identity lookup used as the pre-flight credential check.

use aws_sdk_sts::Client as StsClient;

use crate::aws::{classify_sdk_error, AwsError, AwsResult};
use crate::types::CallerIdentity;

pub(crate) async fn caller_identity(client: &StsClient) -> AwsResult<CallerIdentity> {
    let response = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| classify_sdk_error("sts:GetCallerIdentity", e))?;

    let account_id = response
        .account()
        .ok_or_else(|| AwsError::ServiceError("GetCallerIdentity response missing account".into()))?
        .to_string();
    let arn = response
        .arn()
        .ok_or_else(|| AwsError::ServiceError("GetCallerIdentity response missing ARN".into()))?
        .to_string();

    Ok(CallerIdentity { account_id, arn })
}

pub mod analyze;
pub mod start;
pub mod status;
pub mod summary;

use crate::delivery::{deliver, ChannelSink};
use crate::{Context, Error};

/// Posts a report into the command's channel, as a document when it is long.
pub(crate) async fn send_report(ctx: Context<'_>, report: &str) -> Result<(), Error> {
    let sink = ChannelSink::new(ctx.serenity_context().http.clone(), ctx.channel_id());
    deliver(&sink, report, "summary_", "📋 Full report attached").await?;
    Ok(())
}

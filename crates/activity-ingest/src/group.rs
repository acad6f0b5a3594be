use activity_core::model::Export;
use activity_core::ChannelMessages;
use std::collections::HashMap;

/// Every channel's messages for one guild, ready for [`activity_core::Ingestor::ingest_guild`]
/// (spec §4.F operates per guild; files are grouped by guild before merge).
pub struct GuildBatch {
    pub guild_id_ext: String,
    pub guild_name: String,
    pub channels: Vec<ChannelMessages>,
}

/// Group parsed exports by `guild.id`, preserving first-seen guild order.
pub fn group_by_guild(exports: Vec<Export>) -> Vec<GuildBatch> {
    let mut order = Vec::new();
    let mut batches: HashMap<String, GuildBatch> = HashMap::new();

    for export in exports {
        let channel_id: u64 = export.channel.id.parse().unwrap_or_else(|_| {
            tracing::warn!(
                channel = %export.channel.id,
                "non-numeric channel id, using 0 for tie-break ordering"
            );
            0
        });

        if !batches.contains_key(&export.guild.id) {
            order.push(export.guild.id.clone());
            batches.insert(
                export.guild.id.clone(),
                GuildBatch {
                    guild_id_ext: export.guild.id.clone(),
                    guild_name: export.guild.name.clone(),
                    channels: Vec::new(),
                },
            );
        }
        batches
            .get_mut(&export.guild.id)
            .unwrap()
            .channels
            .push(ChannelMessages {
                channel_id,
                messages: export.messages,
            });
    }

    order
        .into_iter()
        .filter_map(|id| batches.remove(&id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::model::{ChannelRef, GuildRef};

    fn export(guild: &str, channel: &str) -> Export {
        Export {
            guild: GuildRef {
                id: guild.to_string(),
                name: "G".to_string(),
            },
            channel: ChannelRef {
                id: channel.to_string(),
            },
            messages: Vec::new(),
        }
    }

    #[test]
    fn groups_multiple_channels_under_one_guild() {
        let batches = group_by_guild(vec![export("1", "10"), export("1", "11"), export("2", "20")]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].guild_id_ext, "1");
        assert_eq!(batches[0].channels.len(), 2);
        assert_eq!(batches[1].guild_id_ext, "2");
    }
}

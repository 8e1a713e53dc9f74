use stockbatch::api;
use strum::EnumMessage;
use tabled::settings::{Color, object::Columns};

#[derive(clap::Args)]
pub struct AnalystsCommand;

impl AnalystsCommand {
    pub async fn exec(&self) {
        let table_data: Vec<Vec<String>> = api::analysts::list()
            .await
            .iter()
            .map(|analyst| {
                vec![
                    analyst.get_message().unwrap_or_default().to_string(),
                    analyst.get_serializations().join("/"),
                    analyst.focus().to_string(),
                ]
            })
            .collect();

        let mut table = tabled::builder::Builder::from_iter(&table_data).build();
        table.modify(Columns::first(), Color::FG_GREEN);
        println!("{table}");
    }
}

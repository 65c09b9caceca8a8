pub mod info_query;

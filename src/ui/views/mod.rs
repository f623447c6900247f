mod post_list;

pub use post_list::PostListView;

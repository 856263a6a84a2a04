mod concurrency_tests;
mod crud_tests;
mod delete_tests;
mod paging_tests;

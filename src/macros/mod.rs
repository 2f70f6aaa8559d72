mod bitmap_macros;
mod page_macros;

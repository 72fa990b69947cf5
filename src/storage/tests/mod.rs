mod reminder_store_tests;
